//! Task lifecycle events.
//!
//! The scheduler and pipeline emit these through an [`EventDispatcher`];
//! consumers register handlers for logging, structured output, or push
//! notifications without the pipeline knowing about any of them.

use std::sync::Arc;

pub mod json_handler;

#[derive(Debug, Clone)]
pub enum Event {
    /// A document was accepted and placed at the end of the queue.
    TaskQueued {
        task_id: String,
        document: String,
    },

    /// Forward progress on the running task. `progress` is 0..=100 and
    /// never moves backwards for a given task.
    TaskProgress {
        task_id: String,
        progress: u8,
        status: String,
    },

    TaskCompleted {
        task_id: String,
        /// Paths of the produced output files.
        outputs: Vec<String>,
    },

    TaskFailed {
        task_id: String,
        message: String,
    },

    Warning {
        message: String,
    },
}

pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn emit(&self, event: Event) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
