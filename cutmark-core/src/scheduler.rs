//! Strictly serial task queue.
//!
//! One worker thread drains an mpsc channel, so tasks run one at a time in
//! submission order. A failed task emits its event and the worker simply
//! moves on; nothing a document does can stall the queue.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::CoreConfig;
use crate::events::{Event, EventDispatcher};
use crate::external::EncoderSpawner;
use crate::metadata::resolver;
use crate::processing::{self, ProcessingTask, TaskStatus};

/// Accepts edit documents and processes them serially on a worker thread.
///
/// Consumers observe task state exclusively through the dispatcher's
/// events; the queue itself exposes no mutable task handles.
pub struct Scheduler {
    sender: Option<mpsc::Sender<ProcessingTask>>,
    worker: Option<JoinHandle<()>>,
    dispatcher: Arc<EventDispatcher>,
    spawner_ready: Box<dyn Fn() -> crate::error::CoreResult<()> + Send + Sync>,
    recent: Mutex<HashMap<PathBuf, Instant>>,
    debounce_window: Duration,
}

impl Scheduler {
    pub fn new<S>(config: CoreConfig, spawner: S, dispatcher: Arc<EventDispatcher>) -> Self
    where
        S: EncoderSpawner + Clone + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::channel::<ProcessingTask>();
        let debounce_window = config.debounce_window;

        let worker_dispatcher = dispatcher.clone();
        let worker_spawner = spawner.clone();
        let worker = std::thread::spawn(move || {
            worker_loop(receiver, config, worker_spawner, worker_dispatcher);
        });

        let guard_spawner = spawner;
        Self {
            sender: Some(sender),
            worker: Some(worker),
            dispatcher,
            spawner_ready: Box::new(move || guard_spawner.verify()),
            recent: Mutex::new(HashMap::new()),
            debounce_window,
        }
    }

    /// Queues a document for processing. Returns the task id, or `None`
    /// when the submission was a duplicate notification or was rejected
    /// before entering the queue.
    pub fn enqueue(&self, document_path: PathBuf) -> Option<String> {
        if self.is_duplicate(&document_path) {
            log::debug!(
                "ignoring duplicate notification for {}",
                document_path.display()
            );
            return None;
        }

        let task = ProcessingTask::new(document_path);

        if let Err(e) = (self.spawner_ready)() {
            log::error!("rejecting {}: {e}", task.document_path.display());
            self.dispatcher.emit(Event::TaskFailed {
                task_id: task.task_id.clone(),
                message: e.to_string(),
            });
            return None;
        }

        self.mark_submitted(&task.document_path);
        let task_id = task.task_id.clone();
        self.dispatcher.emit(Event::TaskQueued {
            task_id: task_id.clone(),
            document: task.document_path.display().to_string(),
        });
        match self.sender.as_ref() {
            Some(sender) if sender.send(task).is_ok() => Some(task_id),
            _ => {
                log::warn!("scheduler is shut down, dropping submission");
                None
            }
        }
    }

    /// Stops accepting work and waits for the in-flight task to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn is_duplicate(&self, document_path: &PathBuf) -> bool {
        let now = Instant::now();
        let mut recent = match self.recent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        recent.retain(|_, seen| now.duration_since(*seen) < self.debounce_window);
        recent.contains_key(document_path)
    }

    // Registered only once a submission is accepted, so a rejected one
    // does not suppress a prompt retry of the same document.
    fn mark_submitted(&self, document_path: &PathBuf) {
        let mut recent = match self.recent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        recent.insert(document_path.clone(), Instant::now());
    }

    fn stop(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop<S: EncoderSpawner>(
    receiver: mpsc::Receiver<ProcessingTask>,
    config: CoreConfig,
    spawner: S,
    dispatcher: Arc<EventDispatcher>,
) {
    while let Ok(mut task) = receiver.recv() {
        task.status = TaskStatus::Running;
        log::info!("starting task {} ({})", task.task_id, task.document_path.display());

        match run_task(&mut task, &config, &spawner, &dispatcher) {
            Ok(()) => {
                task.status = TaskStatus::Completed;
                dispatcher.emit(Event::TaskCompleted {
                    task_id: task.task_id.clone(),
                    outputs: task
                        .outputs
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect(),
                });
            }
            Err(e) => {
                task.status = TaskStatus::Failed;
                log::error!("task {} failed: {e}", task.task_id);
                dispatcher.emit(Event::TaskFailed {
                    task_id: task.task_id.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
}

fn run_task<S: EncoderSpawner>(
    task: &mut ProcessingTask,
    config: &CoreConfig,
    spawner: &S,
    dispatcher: &EventDispatcher,
) -> crate::error::CoreResult<()> {
    let metadata = resolver::resolve(&task.document_path)?;
    task.outputs = processing::process_task(
        &task.task_id,
        &metadata,
        config,
        spawner,
        dispatcher,
    )?;
    task.progress = 100;

    if config.auto_clean_share {
        processing::clean_share_files(config, &metadata, &task.document_path, dispatcher);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHandler;
    use crate::external::mocks::MockSpawner;
    use std::path::Path;

    struct Recorder {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl EventHandler for Recorder {
        fn handle(&self, event: &Event) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn recording_dispatcher() -> (Arc<EventDispatcher>, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_handler(Arc::new(Recorder {
            events: events.clone(),
        }));
        (Arc::new(dispatcher), events)
    }

    fn write_document(share: &Path, name: &str, video: &str) -> PathBuf {
        std::fs::write(share.join(video), b"fake video").unwrap();
        let document = share.join(name);
        let json = format!(
            r#"{{
                "videoFileName": "{video}",
                "videoWidth": 1920,
                "videoHeight": 1080,
                "groups": {{ "1": {{ "id": 1, "width": 640, "height": 360 }} }},
                "segments": [
                    {{ "centerX": 960, "centerY": 540, "groupId": 1, "startTime": 0.0, "endTime": 2.0 }}
                ]
            }}"#
        );
        std::fs::write(&document, json).unwrap();
        document
    }

    fn test_config(root: &Path) -> CoreConfig {
        let config = CoreConfig::new(root.join("share"), root.join("out"));
        config.ensure_directories().unwrap();
        config
    }

    fn completions(events: &Arc<Mutex<Vec<Event>>>) -> Vec<Event> {
        events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, Event::TaskCompleted { .. } | Event::TaskFailed { .. }))
            .cloned()
            .collect()
    }

    #[test]
    fn tasks_complete_in_submission_order() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let (dispatcher, events) = recording_dispatcher();
        let scheduler = Scheduler::new(config.clone(), MockSpawner::new(), dispatcher);

        let first = write_document(&config.share_dir, "a.json", "first.mp4");
        let second = write_document(&config.share_dir, "b.json", "second.mp4");

        let id_a = scheduler.enqueue(first).unwrap();
        let id_b = scheduler.enqueue(second).unwrap();
        scheduler.shutdown();

        let done = completions(&events);
        assert_eq!(done.len(), 2);
        match (&done[0], &done[1]) {
            (
                Event::TaskCompleted { task_id: t0, .. },
                Event::TaskCompleted { task_id: t1, .. },
            ) => {
                assert_eq!(t0, &id_a);
                assert_eq!(t1, &id_b);
            }
            other => panic!("unexpected completion events: {other:?}"),
        }
    }

    #[test]
    fn failed_task_does_not_halt_the_queue() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let (dispatcher, events) = recording_dispatcher();
        let scheduler = Scheduler::new(config.clone(), MockSpawner::new(), dispatcher);

        let broken = config.share_dir.join("broken.json");
        std::fs::write(&broken, b"{ not json").unwrap();
        let good = write_document(&config.share_dir, "good.json", "clip.mp4");

        scheduler.enqueue(broken).unwrap();
        scheduler.enqueue(good).unwrap();
        scheduler.shutdown();

        let done = completions(&events);
        assert_eq!(done.len(), 2);
        assert!(matches!(done[0], Event::TaskFailed { .. }));
        assert!(matches!(done[1], Event::TaskCompleted { .. }));
    }

    #[test]
    fn missing_video_surfaces_as_task_failure() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let (dispatcher, events) = recording_dispatcher();
        let scheduler = Scheduler::new(config.clone(), MockSpawner::new(), dispatcher);

        // document only, no video file anywhere in the share folder
        let document = config.share_dir.join("orphan.json");
        std::fs::write(
            &document,
            r#"{
                "videoFileName": "nowhere.mp4",
                "videoWidth": 1920,
                "videoHeight": 1080,
                "groups": { "1": { "id": 1, "width": 640, "height": 360 } },
                "segments": [
                    { "centerX": 960, "centerY": 540, "groupId": 1, "startTime": 0.0, "endTime": 2.0 }
                ]
            }"#,
        )
        .unwrap();

        scheduler.enqueue(document).unwrap();
        scheduler.shutdown();

        let done = completions(&events);
        assert_eq!(done.len(), 1);
        match &done[0] {
            Event::TaskFailed { message, .. } => {
                assert!(message.contains("not found"), "message: {message}");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn duplicate_notification_within_window_is_ignored() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let (dispatcher, _) = recording_dispatcher();
        let scheduler = Scheduler::new(config.clone(), MockSpawner::new(), dispatcher);

        let document = write_document(&config.share_dir, "a.json", "clip.mp4");

        assert!(scheduler.enqueue(document.clone()).is_some());
        assert!(scheduler.enqueue(document).is_none());
        scheduler.shutdown();
    }

    #[test]
    fn missing_encoder_rejects_before_queueing() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let (dispatcher, events) = recording_dispatcher();

        let spawner = MockSpawner::new();
        spawner.set_unavailable();
        let scheduler = Scheduler::new(config.clone(), spawner.clone(), dispatcher);

        let document = write_document(&config.share_dir, "a.json", "clip.mp4");
        assert!(scheduler.enqueue(document).is_none());
        scheduler.shutdown();

        let recorded = events.lock().unwrap();
        assert!(recorded
            .iter()
            .all(|e| !matches!(e, Event::TaskQueued { .. })));
        assert!(recorded.iter().any(|e| matches!(e, Event::TaskFailed { .. })));
        assert!(spawner.received_calls().is_empty());
    }

    #[test]
    fn rejected_submission_does_not_start_debounce_window() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let (dispatcher, _) = recording_dispatcher();

        let spawner = MockSpawner::new();
        spawner.set_unavailable();
        let scheduler = Scheduler::new(config.clone(), spawner.clone(), dispatcher);

        let document = write_document(&config.share_dir, "a.json", "clip.mp4");
        assert!(scheduler.enqueue(document.clone()).is_none());

        // encoder shows up, an immediate retry must go through
        spawner.set_available();
        assert!(scheduler.enqueue(document).is_some());
        scheduler.shutdown();
    }

    #[test]
    fn auto_clean_removes_processed_files() {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path());
        config.auto_clean_share = true;
        let (dispatcher, _) = recording_dispatcher();
        let scheduler = Scheduler::new(config.clone(), MockSpawner::new(), dispatcher);

        let document = write_document(&config.share_dir, "a.json", "clip.mp4");
        scheduler.enqueue(document.clone()).unwrap();
        scheduler.shutdown();

        assert!(!document.exists());
        assert!(!config.share_dir.join("clip.mp4").exists());
    }
}
