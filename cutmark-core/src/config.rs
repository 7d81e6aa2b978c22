//! Configuration for the cutmark-core library.
//!
//! A `CoreConfig` is built once by the consumer (the CLI) and passed into the
//! compiler, pipeline, and scheduler at construction. There is no ambient
//! settings lookup anywhere in the core.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::metadata::{AudioCodec, VideoCodec};

/// Default constant-quality value when a document does not carry one.
pub const DEFAULT_VIDEO_QUALITY: u32 = 23;

/// Default encoder speed preset.
pub const DEFAULT_PRESET: &str = "medium";

/// How long the watcher waits after a document appears before reading it,
/// giving the producer time to finish writing.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Window within which a duplicate filesystem notification for the same
/// document path is ignored.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(2000);

/// Upper bound for numeric collision suffixes before falling back to a
/// timestamped name.
pub const MAX_COLLISION_SUFFIX: u32 = 9999;

/// Process-wide configuration for the watch/encode service.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Folder watched for incoming edit documents (and their videos).
    pub share_dir: PathBuf,

    /// Where finished outputs are written, unless the source was resolved
    /// through a remote locator.
    pub output_dir: PathBuf,

    /// Explicit encoder binary; `None` means discover `ffmpeg` on PATH.
    pub ffmpeg_path: Option<PathBuf>,

    /// Base for per-task working directories; `None` uses `output_dir`.
    pub temp_dir: Option<PathBuf>,

    /// Fallback video codec for documents that do not name one.
    pub video_codec: VideoCodec,

    /// Fallback audio codec.
    pub audio_codec: AudioCodec,

    /// Fallback constant-quality value for documents with an absent or
    /// non-positive `cq`.
    pub quality: u32,

    /// Encoder speed preset passed to every non-passthrough invocation.
    pub preset: String,

    /// Delete the document (and a video that lives inside `share_dir`) after
    /// a successful task.
    pub auto_clean_share: bool,

    pub settle_delay: Duration,

    pub debounce_window: Duration,

    /// Optional ntfy topic URL for completion notifications.
    pub ntfy_topic: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            share_dir: PathBuf::from("share"),
            output_dir: PathBuf::from("output"),
            ffmpeg_path: None,
            temp_dir: None,
            video_codec: VideoCodec::H264Cpu,
            audio_codec: AudioCodec::Aac,
            quality: DEFAULT_VIDEO_QUALITY,
            preset: DEFAULT_PRESET.to_string(),
            auto_clean_share: false,
            settle_delay: DEFAULT_SETTLE_DELAY,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            ntfy_topic: None,
        }
    }
}

impl CoreConfig {
    /// Creates a configuration with the given directories and defaults for
    /// everything else.
    pub fn new(share_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            share_dir,
            output_dir,
            ..Self::default()
        }
    }

    /// Checks values that would otherwise fail deep inside the pipeline.
    pub fn validate(&self) -> CoreResult<()> {
        if self.share_dir.as_os_str().is_empty() {
            return Err(CoreError::Config("share_dir must not be empty".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(CoreError::Config("output_dir must not be empty".into()));
        }
        if self.preset.is_empty() {
            return Err(CoreError::Config("preset must not be empty".into()));
        }
        if self.quality > 51 {
            return Err(CoreError::Config(format!(
                "quality {} out of range (0-51)",
                self.quality
            )));
        }
        Ok(())
    }

    /// Creates the share and output directories if they do not exist yet.
    pub fn ensure_directories(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.share_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }
}
