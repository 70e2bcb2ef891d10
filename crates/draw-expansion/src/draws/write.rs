//! Save an indirect buffer to disk.

#![expect(
    clippy::little_endian_bytes,
    reason = "Indirect buffers are little endian on every API we target"
)]

use std::io::Write as _;

use color_eyre::{eyre::WrapErr as _, Result};
use kernel::command::DrawCommand;

/// Write the commands exactly as a GPU would read them from an indirect buffer.
pub fn write(path: &std::path::Path, commands: &[DrawCommand]) -> Result<()> {
    tracing::info!(
        "Writing {} draw commands to: {}",
        commands.len(),
        path.display()
    );
    let mut file = std::fs::File::create(path)
        .wrap_err_with(|| format!("Couldn't create indirect buffer file: {}", path.display()))?;
    file.write_all(&encode(commands))?;
    Ok(())
}

/// A path for one of several indirect buffers: `draws.bin` becomes `draws.2.bin`.
pub fn numbered(path: &std::path::Path, index: usize) -> std::path::PathBuf {
    let stem = path
        .file_stem()
        .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned());
    let name = match path.extension() {
        Some(extension) => format!("{stem}.{index}.{}", extension.to_string_lossy()),
        None => format!("{stem}.{index}"),
    };
    path.with_file_name(name)
}

/// The raw bytes of an indirect buffer.
pub fn encode(commands: &[DrawCommand]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(commands));
    for command in commands {
        bytes.extend_from_slice(&command.index_count.to_le_bytes());
        bytes.extend_from_slice(&command.instance_count.to_le_bytes());
        bytes.extend_from_slice(&command.first_index.to_le_bytes());
        bytes.extend_from_slice(&command.base_vertex.to_le_bytes());
        bytes.extend_from_slice(&command.first_instance.to_le_bytes());
    }
    bytes
}
