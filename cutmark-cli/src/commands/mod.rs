//! Subcommand implementations.

pub mod encode;
pub mod watch;

use std::sync::Arc;

use cutmark_core::events::json_handler::JsonEventHandler;
use cutmark_core::notifications::{NotificationHandler, NtfyNotifier};
use cutmark_core::EventDispatcher;

use crate::cli::ReportingArgs;
use crate::output::ConsoleEventHandler;

/// Wires up the event handlers the reporting flags ask for.
pub fn build_dispatcher(reporting: &ReportingArgs) -> Arc<EventDispatcher> {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.add_handler(Arc::new(ConsoleEventHandler));
    if reporting.json {
        dispatcher.add_handler(Arc::new(JsonEventHandler::new()));
    }
    if let Some(topic) = &reporting.ntfy {
        dispatcher.add_handler(Arc::new(NotificationHandler::new(
            NtfyNotifier::new(),
            topic.clone(),
        )));
    }
    Arc::new(dispatcher)
}
