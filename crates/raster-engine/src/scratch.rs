//! Per-operation scratch directories.

use crate::error::Result;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

/// Create a uniquely named scratch directory under `parent`, or under the
/// system temp directory when `parent` is `None`. The directory and its
/// contents are removed when the returned guard is dropped.
pub fn scratch_dir(prefix: &str, parent: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    let dir = match parent {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            builder.tempdir_in(parent)?
        }
        None => builder.tempdir()?,
    };
    debug!(path = %dir.path().display(), "created scratch directory");
    Ok(dir)
}
