//! JSON-lines event handler for consumption by external supervisors.

use super::{Event, EventHandler};
use serde_json::json;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes one JSON object per event to the wrapped writer (stdout by
/// default).
pub struct JsonEventHandler {
    output: Mutex<Box<dyn Write + Send>>,
}

impl JsonEventHandler {
    pub fn new() -> Self {
        Self {
            output: Mutex::new(Box::new(io::stdout())),
        }
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            output: Mutex::new(writer),
        }
    }

    fn timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn write_json(&self, value: serde_json::Value) {
        if let Ok(mut output) = self.output.lock() {
            if let Ok(line) = serde_json::to_string(&value) {
                let _ = writeln!(output, "{}", line);
                let _ = output.flush();
            }
        }
    }
}

impl EventHandler for JsonEventHandler {
    fn handle(&self, event: &Event) {
        let timestamp = Self::timestamp();

        match event {
            Event::TaskQueued { task_id, document } => {
                self.write_json(json!({
                    "type": "task_queued",
                    "task_id": task_id,
                    "document": document,
                    "timestamp": timestamp
                }));
            }

            Event::TaskProgress {
                task_id,
                progress,
                status,
            } => {
                self.write_json(json!({
                    "type": "task_progress",
                    "task_id": task_id,
                    "progress": progress,
                    "status": status,
                    "timestamp": timestamp
                }));
            }

            Event::TaskCompleted { task_id, outputs } => {
                self.write_json(json!({
                    "type": "task_completed",
                    "task_id": task_id,
                    "outputs": outputs,
                    "timestamp": timestamp
                }));
            }

            Event::TaskFailed { task_id, message } => {
                self.write_json(json!({
                    "type": "task_failed",
                    "task_id": task_id,
                    "message": message,
                    "timestamp": timestamp
                }));
            }

            Event::Warning { message } => {
                self.write_json(json!({
                    "type": "warning",
                    "message": message,
                    "timestamp": timestamp
                }));
            }
        }
    }
}

impl Default for JsonEventHandler {
    fn default() -> Self {
        Self::new()
    }
}
