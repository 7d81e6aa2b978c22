//! Push notifications over ntfy.
//!
//! Optional: wired up only when the configuration carries a topic URL. A
//! notification failure is logged and never fails the task that triggered
//! it.

use ntfy::error::Error as NtfyError;
use ntfy::payload::{Payload, Priority};
use ntfy::DispatcherBuilder;
use url::Url;

use crate::error::{CoreError, CoreResult};
use crate::events::{Event, EventHandler};

/// Sends a human-readable notification.
pub trait Notifier: Send + Sync {
    fn send(&self, topic_url: &str, title: &str, message: &str, priority: Priority)
        -> CoreResult<()>;
}

/// Blocking ntfy-backed notifier.
#[derive(Debug, Default)]
pub struct NtfyNotifier;

impl NtfyNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for NtfyNotifier {
    fn send(
        &self,
        topic_url: &str,
        title: &str,
        message: &str,
        priority: Priority,
    ) -> CoreResult<()> {
        let parsed = Url::parse(topic_url).map_err(|e| {
            CoreError::Notification(format!("invalid ntfy topic URL '{topic_url}': {e}"))
        })?;
        let host = match parsed.host_str() {
            Some(h) if !h.is_empty() => h,
            _ => {
                return Err(CoreError::Notification(format!(
                    "ntfy URL '{topic_url}' must have a host"
                )))
            }
        };
        let base_url = format!("{}://{host}", parsed.scheme());
        let topic = parsed.path().trim_start_matches('/');
        if topic.is_empty() {
            return Err(CoreError::Notification(format!(
                "ntfy URL '{topic_url}' is missing a topic path"
            )));
        }

        let dispatcher = DispatcherBuilder::new(&base_url)
            .build_blocking()
            .map_err(|e: NtfyError| {
                CoreError::Notification(format!("failed to build ntfy dispatcher: {e}"))
            })?;

        let payload = Payload::new(topic)
            .title(title)
            .message(message)
            .priority(priority)
            .tags(vec!["cutmark".to_string()]);

        dispatcher.send(&payload).map_err(|e: NtfyError| {
            CoreError::Notification(format!("failed to send ntfy notification: {e}"))
        })
    }
}

/// Event handler that announces terminal task states to an ntfy topic.
pub struct NotificationHandler<N: Notifier> {
    notifier: N,
    topic_url: String,
}

impl<N: Notifier> NotificationHandler<N> {
    pub fn new(notifier: N, topic_url: String) -> Self {
        Self {
            notifier,
            topic_url,
        }
    }
}

impl<N: Notifier> EventHandler for NotificationHandler<N> {
    fn handle(&self, event: &Event) {
        let result = match event {
            Event::TaskCompleted { outputs, .. } => self.notifier.send(
                &self.topic_url,
                "Encoding complete",
                &format!("{} output file(s) ready", outputs.len()),
                Priority::Default,
            ),
            Event::TaskFailed { message, .. } => self.notifier.send(
                &self.topic_url,
                "Encoding failed",
                message,
                Priority::High,
            ),
            _ => return,
        };
        if let Err(e) = result {
            log::warn!("notification delivery failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl Notifier for RecordingNotifier {
        fn send(
            &self,
            _topic_url: &str,
            title: &str,
            message: &str,
            _priority: Priority,
        ) -> CoreResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            Ok(())
        }
    }

    #[test]
    fn terminal_events_are_announced_progress_is_not() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let handler = NotificationHandler::new(
            RecordingNotifier { sent: sent.clone() },
            "https://ntfy.sh/demo".to_string(),
        );

        handler.handle(&Event::TaskProgress {
            task_id: "t".into(),
            progress: 50,
            status: "encoding".into(),
        });
        handler.handle(&Event::TaskCompleted {
            task_id: "t".into(),
            outputs: vec!["/out/clip.mp4".into()],
        });
        handler.handle(&Event::TaskFailed {
            task_id: "t".into(),
            message: "boom".into(),
        });

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "Encoding complete");
        assert_eq!(sent[1].1, "boom");
    }

    #[test]
    fn rejects_topic_url_without_host() {
        let notifier = NtfyNotifier::new();
        let err = notifier
            .send("file:///not-a-topic", "t", "m", Priority::Default)
            .unwrap_err();
        assert!(matches!(err, CoreError::Notification(_)));
    }
}
