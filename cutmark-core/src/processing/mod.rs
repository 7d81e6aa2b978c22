//! Task processing: output naming and the per-task pipeline.

pub mod outputs;
pub mod pipeline;

use std::path::PathBuf;

pub use outputs::{clean_share_files, group_output_name, unique_output_path};
pub use pipeline::process_task;

/// Lifecycle of a queued document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// One entry in the scheduler's queue: a document waiting to be (or being)
/// processed. Mutated only by the scheduler thread; consumers observe it
/// through events.
#[derive(Debug, Clone)]
pub struct ProcessingTask {
    pub task_id: String,
    /// The edit document this task was created from.
    pub document_path: PathBuf,
    pub status: TaskStatus,
    /// 0..=100, non-decreasing.
    pub progress: u8,
    /// Output files, populated on completion.
    pub outputs: Vec<PathBuf>,
}

impl ProcessingTask {
    pub fn new(document_path: PathBuf) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            document_path,
            status: TaskStatus::Queued,
            progress: 0,
            outputs: Vec::new(),
        }
    }
}
