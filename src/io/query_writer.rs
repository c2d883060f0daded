//! All-or-nothing file output for rendered SQL

use crate::common::error::PivotResult;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `contents` to `path`, replacing any existing file.
///
/// The text goes to a temporary file in the same directory which is then
/// renamed over the destination, so readers see either the old file or the
/// complete new one. On error the temporary file is removed.
pub fn write_atomically(path: &Path, contents: &str) -> PivotResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
