//! The `encode` subcommand: process one document and exit.

use cutmark_core::external::{EncoderSpawner, SidecarSpawner};
use cutmark_core::{CoreError, ProcessingTask};

use crate::cli::EncodeArgs;
use crate::config::build_config;

pub fn run_encode(args: EncodeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let document = args.document.canonicalize().map_err(|e| {
        format!("invalid document path '{}': {e}", args.document.display())
    })?;
    let share_dir = document
        .parent()
        .ok_or_else(|| {
            CoreError::PathError(format!(
                "document '{}' has no parent directory",
                document.display()
            ))
        })?
        .to_path_buf();

    let config = build_config(share_dir, args.output_dir, &args.encoding)?;
    std::fs::create_dir_all(&config.output_dir)?;

    let spawner = SidecarSpawner {
        ffmpeg_path: config.ffmpeg_path.clone(),
    };
    spawner.verify()?;

    let dispatcher = super::build_dispatcher(&args.reporting);
    let task = ProcessingTask::new(document.clone());

    let metadata = cutmark_core::resolve(&document)?;
    let outputs = cutmark_core::process_task(
        &task.task_id,
        &metadata,
        &config,
        &spawner,
        &dispatcher,
    )?;

    for output in &outputs {
        log::info!("wrote {}", output.display());
    }
    Ok(())
}
