//! Share-folder watcher.
//!
//! Feeds newly written edit documents into the scheduler. A short settle
//! delay runs between the filesystem notification and the enqueue so the
//! producer can finish writing; the scheduler's debounce window absorbs
//! the duplicate create/modify notifications most platforms deliver.

use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use notify::{EventKind, RecursiveMode, Watcher};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::scheduler::Scheduler;

/// Watches the share folder and enqueues edit documents as they appear.
pub struct ShareWatcher {
    watcher: Option<notify::RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
}

impl ShareWatcher {
    pub fn start(config: &CoreConfig, scheduler: Arc<Scheduler>) -> CoreResult<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(|e| CoreError::Watcher(e.to_string()))?;
        watcher
            .watch(&config.share_dir, RecursiveMode::NonRecursive)
            .map_err(|e| CoreError::Watcher(e.to_string()))?;
        log::info!("watching {}", config.share_dir.display());

        let settle_delay = config.settle_delay;
        let worker = std::thread::spawn(move || {
            for result in rx {
                let event = match result {
                    Ok(event) => event,
                    Err(e) => {
                        log::warn!("watch error: {e}");
                        continue;
                    }
                };
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    continue;
                }
                for path in event.paths {
                    if !is_edit_document(&path) {
                        continue;
                    }
                    log::debug!("document notification: {}", path.display());
                    std::thread::sleep(settle_delay);
                    scheduler.enqueue(path);
                }
            }
        });

        Ok(Self {
            watcher: Some(watcher),
            worker: Some(worker),
        })
    }

    /// Stops watching. Documents already handed to the scheduler are
    /// unaffected.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        drop(self.watcher.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for ShareWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Enqueues every edit document already sitting in the share folder.
/// Returns the number of documents submitted.
pub fn sweep_existing(config: &CoreConfig, scheduler: &Scheduler) -> CoreResult<usize> {
    let mut documents: Vec<_> = std::fs::read_dir(&config.share_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_edit_document(path))
        .collect();
    documents.sort();

    let mut submitted = 0;
    for document in documents {
        if scheduler.enqueue(document).is_some() {
            submitted += 1;
        }
    }
    Ok(submitted)
}

fn is_edit_document(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
