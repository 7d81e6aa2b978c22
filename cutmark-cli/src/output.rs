//! Console event handler.

use cutmark_core::{Event, EventHandler};

/// Renders task events through the log facade.
pub struct ConsoleEventHandler;

impl EventHandler for ConsoleEventHandler {
    fn handle(&self, event: &Event) {
        match event {
            Event::TaskQueued { task_id, document } => {
                log::info!("[{task_id}] queued {document}");
            }
            Event::TaskProgress {
                task_id,
                progress,
                status,
            } => {
                log::info!("[{task_id}] {progress:3}% {status}");
            }
            Event::TaskCompleted { task_id, outputs } => {
                log::info!("[{task_id}] completed:");
                for output in outputs {
                    log::info!("[{task_id}]   {output}");
                }
            }
            Event::TaskFailed { task_id, message } => {
                log::error!("[{task_id}] failed: {message}");
            }
            Event::Warning { message } => {
                log::warn!("{message}");
            }
        }
    }
}
