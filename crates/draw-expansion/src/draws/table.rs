//! Print draw commands as a table.

use std::fmt::Write as _;

use color_eyre::Result;
use kernel::command::DrawCommand;

/// Column headings.
const HEADINGS: [&str; 6] = [
    "draw",
    "index_count",
    "instance_count",
    "first_index",
    "base_vertex",
    "first_instance",
];

/// Render one row per command.
pub fn render(commands: &[DrawCommand]) -> Result<String> {
    let mut table = String::new();
    writeln!(table, "{}", HEADINGS.join("  "))?;
    for (draw_id, command) in commands.iter().enumerate() {
        writeln!(
            table,
            "{draw_id:>4}  {:>11}  {:>14}  {:>11}  {:>11}  {:>14}",
            command.index_count,
            command.instance_count,
            command.first_index,
            command.base_vertex,
            command.first_instance,
        )?;
    }
    Ok(table)
}

/// Print the table to stdout.
#[expect(clippy::print_stdout, reason = "Printing the table is the whole point")]
pub fn print(commands: &[DrawCommand]) -> Result<()> {
    print!("{}", render(commands)?);
    Ok(())
}

#[expect(clippy::unwrap_used, clippy::indexing_slicing, reason = "These are just tests")]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn one_row_per_command() {
        let commands = [
            DrawCommand {
                index_count: 5,
                instance_count: 1,
                first_index: 100,
                base_vertex: 10,
                first_instance: 0,
            },
            DrawCommand {
                index_count: 7,
                instance_count: 1,
                first_index: 200,
                base_vertex: -1,
                first_instance: 1,
            },
        ];
        let table = render(&commands).unwrap();
        let lines = table.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("draw  index_count"));
        assert_eq!(
            lines[2].split_whitespace().collect::<Vec<_>>(),
            ["1", "7", "1", "200", "-1", "1"]
        );
    }

    #[test]
    fn empty_table_has_headings() {
        assert_eq!(render(&[]).unwrap().lines().count(), 1);
    }
}
