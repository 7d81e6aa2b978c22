//! Core library for the edit-document encoding service.
//!
//! Watches a share folder for JSON edit documents produced by a companion
//! mobile editor, resolves each document's source video, compiles the
//! ffmpeg invocations that crop, rotate, trim, scale, and concatenate the
//! requested segments, and runs them on a strictly serial task queue.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use cutmark_core::{CoreConfig, EventDispatcher, Scheduler, ShareWatcher};
//! use cutmark_core::external::SidecarSpawner;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::new(PathBuf::from("/srv/share"), PathBuf::from("/srv/output"));
//! config.validate().unwrap();
//! config.ensure_directories().unwrap();
//!
//! let dispatcher = Arc::new(EventDispatcher::new());
//! let scheduler = Arc::new(Scheduler::new(
//!     config.clone(),
//!     SidecarSpawner::default(),
//!     dispatcher,
//! ));
//! let watcher = ShareWatcher::start(&config, scheduler).unwrap();
//! // ... run until shutdown ...
//! watcher.shutdown();
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod events;
pub mod external;
pub mod metadata;
pub mod notifications;
pub mod processing;
pub mod scheduler;
pub mod temp_files;
pub mod watcher;

// Re-exports for public API
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use events::{Event, EventDispatcher, EventHandler};
pub use metadata::{resolver::resolve, EditMetadata};
pub use processing::{process_task, ProcessingTask, TaskStatus};
pub use scheduler::Scheduler;
pub use watcher::{sweep_existing, ShareWatcher};
