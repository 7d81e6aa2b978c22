//! Command-line argument structures.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Cutmark: edit-document encoding service",
    long_about = "Watches a share folder for edit documents from the companion \
                  mobile editor and encodes the requested video cuts via ffmpeg."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watches a share folder and processes edit documents as they arrive
    Watch(WatchArgs),
    /// Processes a single edit document and exits
    Encode(EncodeArgs),
}

#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Folder to watch for incoming edit documents (and their videos)
    #[arg(short = 's', long = "share", required = true, value_name = "SHARE_DIR")]
    pub share_dir: PathBuf,

    /// Directory where finished outputs are written
    #[arg(short = 'o', long = "output", required = true, value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Also process documents already present in the share folder at startup
    #[arg(long, default_value_t = false)]
    pub process_existing: bool,

    /// Delete documents (and in-share videos) after successful processing
    #[arg(long, default_value_t = false)]
    pub auto_clean: bool,

    #[command(flatten)]
    pub encoding: EncodingArgs,

    #[command(flatten)]
    pub reporting: ReportingArgs,
}

#[derive(Parser, Debug)]
pub struct EncodeArgs {
    /// The edit document to process
    #[arg(required = true, value_name = "DOCUMENT")]
    pub document: PathBuf,

    /// Directory where finished outputs are written
    #[arg(short = 'o', long = "output", required = true, value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub encoding: EncodingArgs,

    #[command(flatten)]
    pub reporting: ReportingArgs,
}

/// Encoder defaults applied when a document does not carry its own values.
#[derive(Parser, Debug)]
pub struct EncodingArgs {
    /// Explicit ffmpeg binary (defaults to `ffmpeg` on PATH)
    #[arg(long, value_name = "FFMPEG_PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Default video codec: h264, h264_nvenc, h264_amf, h265, hevc_nvenc, hevc_amf, copy
    #[arg(long, value_name = "CODEC")]
    pub codec: Option<String>,

    /// Default constant-quality value (0-51)
    #[arg(long, value_name = "QUALITY", value_parser = clap::value_parser!(u32).range(0..=51))]
    pub quality: Option<u32>,

    /// Encoder speed preset passed to every invocation
    #[arg(long, value_name = "PRESET")]
    pub preset: Option<String>,

    /// Base directory for per-task working files (defaults to OUTPUT_DIR)
    #[arg(long, value_name = "TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ReportingArgs {
    /// Emit task events as JSON lines on stdout
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// ntfy topic URL for completion notifications.
    /// Can also be set via the CUTMARK_NTFY_TOPIC environment variable.
    #[arg(long, value_name = "TOPIC_URL", env = "CUTMARK_NTFY_TOPIC")]
    pub ntfy: Option<String>,
}
