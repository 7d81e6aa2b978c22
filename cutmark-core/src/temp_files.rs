//! Temporary working directories for in-flight tasks.
//!
//! Each task gets its own directory for intermediate segment files and the
//! concat list. The tempfile crate deletes it on drop, so partial products
//! never outlive a failed task.

use std::path::{Path, PathBuf};

use tempfile::{Builder as TempFileBuilder, TempDir};

use crate::config::CoreConfig;
use crate::error::CoreResult;

/// Creates the working directory for one task. Auto-cleaned when dropped.
pub fn create_task_dir(config: &CoreConfig, prefix: &str) -> CoreResult<TempDir> {
    let base = config.temp_dir.as_ref().unwrap_or(&config.output_dir);
    std::fs::create_dir_all(base)?;

    Ok(TempFileBuilder::new().prefix(prefix).tempdir_in(base)?)
}

/// Path for an intermediate file inside a task directory. Does not create
/// the file.
pub fn segment_file_path(dir: &Path, group_id: u32, index: usize, extension: &str) -> PathBuf {
    dir.join(format!("g{group_id}_s{index:03}.{extension}"))
}
