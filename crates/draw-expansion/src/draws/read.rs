//! Load draw descriptors from a text file.
//!
//! One descriptor per line: `vertex_start vertex_count index_start index_count`, separated by
//! whitespace and/or commas. Blank lines and `#` comments are ignored.

use color_eyre::{eyre::WrapErr as _, Result};
use kernel::command::DrawDescriptor;

/// Marks the rest of a line as a comment.
const COMMENT: char = '#';

/// Read and parse a descriptors file.
pub fn read(path: &std::path::Path) -> Result<Vec<DrawDescriptor>> {
    tracing::info!("Loading draw descriptors from: {}", path.display());
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Couldn't read descriptors file: {}", path.display()))?;
    let descriptors = parse(&text)?;
    tracing::info!("Loaded {} draw descriptors", descriptors.len());
    Ok(descriptors)
}

/// Parse descriptors from text.
pub fn parse(text: &str) -> Result<Vec<DrawDescriptor>> {
    let mut descriptors = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let number = index.saturating_add(1);
        let content = line
            .split_once(COMMENT)
            .map_or(line, |(before, _comment)| before);
        if content.trim().is_empty() {
            continue;
        }

        let descriptor =
            parse_line(content).wrap_err_with(|| format!("Bad descriptor on line {number}"))?;
        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

/// Parse the four fields of a single descriptor.
fn parse_line(content: &str) -> Result<DrawDescriptor> {
    let fields = content
        .split(|character: char| character.is_whitespace() || character == ',')
        .filter(|field| !field.is_empty())
        .map(|field| {
            field
                .parse::<u32>()
                .wrap_err_with(|| format!("`{field}` isn't an unsigned 32 bit integer"))
        })
        .collect::<Result<Vec<u32>>>()?;

    let &[vertex_start, vertex_count, index_start, index_count] = fields.as_slice() else {
        color_eyre::eyre::bail!(
            "Expected 4 fields (vertex_start vertex_count index_start index_count), found {}",
            fields.len()
        );
    };

    Ok(DrawDescriptor {
        vertex_start,
        vertex_count,
        index_start,
        index_count,
    })
}

#[expect(clippy::unwrap_used, clippy::indexing_slicing, reason = "These are just tests")]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn separators_and_comments() {
        let text = "\
# vertex_start vertex_count index_start index_count
10 0 100 5
20,0,200,7   # trailing comment

  0, 0,\t0 3
";
        let descriptors = parse(text).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            descriptors,
            [
                DrawDescriptor { vertex_start: 10, vertex_count: 0, index_start: 100, index_count: 5 },
                DrawDescriptor { vertex_start: 20, vertex_count: 0, index_start: 200, index_count: 7 },
                DrawDescriptor { vertex_start: 0,  vertex_count: 0, index_start: 0,   index_count: 3 },
            ]
        );
    }

    #[test]
    fn empty_file() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("# nothing here\n\n").unwrap().is_empty());
    }

    #[test]
    fn errors_name_the_line() {
        let error = parse("1 2 3 4\n\n1 2 three 4\n").unwrap_err();
        assert!(format!("{error}").contains("line 3"));

        let error = parse("1 2 3\n").unwrap_err();
        assert!(format!("{error}").contains("line 1"));
        assert!(format!("{error:?}").contains("found 3"));
    }

    #[test]
    fn negative_and_oversized_values_are_refused() {
        assert!(parse("-1 0 0 0").is_err());
        assert!(parse("4294967296 0 0 0").is_err());
        assert_eq!(parse("4294967295 0 0 0").unwrap()[0].vertex_start, u32::MAX);
    }

    #[test]
    fn too_many_fields() {
        assert!(parse("1 2 3 4 5").is_err());
    }
}
