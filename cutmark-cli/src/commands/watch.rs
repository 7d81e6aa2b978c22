//! The `watch` subcommand: run the share-folder service until killed.

use std::sync::Arc;

use cutmark_core::external::{EncoderSpawner, SidecarSpawner};
use cutmark_core::{Scheduler, ShareWatcher};

use crate::cli::WatchArgs;
use crate::config::build_config;

pub fn run_watch(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = build_config(args.share_dir, args.output_dir, &args.encoding)?;
    config.auto_clean_share = args.auto_clean;
    config.ntfy_topic = args.reporting.ntfy.clone();
    config.ensure_directories()?;

    let spawner = SidecarSpawner {
        ffmpeg_path: config.ffmpeg_path.clone(),
    };
    if let Err(e) = spawner.verify() {
        // the scheduler rejects each submission too; this is just an early heads-up
        log::error!("encoder unavailable, incoming documents will fail: {e}");
    }

    let dispatcher = super::build_dispatcher(&args.reporting);
    let scheduler = Arc::new(Scheduler::new(config.clone(), spawner, dispatcher));

    if args.process_existing {
        let submitted = cutmark_core::sweep_existing(&config, &scheduler)?;
        log::info!("queued {submitted} existing document(s)");
    }

    let _watcher = ShareWatcher::start(&config, scheduler)?;
    log::info!(
        "watching {} -> {}",
        config.share_dir.display(),
        config.output_dir.display()
    );

    loop {
        std::thread::park();
    }
}
