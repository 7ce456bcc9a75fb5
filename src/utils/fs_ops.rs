use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::{Error, VideoHashResult};

/// Write a file by first writing a sibling ".tmp" file, syncing it and then renaming it over
/// the destination. A crash while saving therefore never leaves a truncated file behind.
///
/// `io_err` turns an I/O failure into the caller's error variant.
pub fn save_atomically<W>(
    path: &Path,
    io_err: impl Fn(std::io::Error) -> Error,
    write: W,
) -> VideoHashResult<()>
where
    W: FnOnce(&mut BufWriter<File>) -> VideoHashResult<()>,
{
    //The parent directory may not exist yet.
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            std::fs::create_dir_all(parent_dir).map_err(&io_err)?;
        }
    }

    let temp_path = path.with_extension("tmp");
    let temp_file = File::create(&temp_path).map_err(&io_err)?;

    let mut buf = BufWriter::new(temp_file);
    write(&mut buf)?;
    buf.flush().map_err(&io_err)?;

    let temp_file = buf.into_inner().map_err(|e| io_err(e.into_error()))?;
    temp_file.sync_all().map_err(&io_err)?;

    std::fs::rename(&temp_path, path).map_err(&io_err)
}
