//! Output naming, overwrite avoidance, and share-folder cleanup.

use std::path::{Path, PathBuf};

use crate::config::{CoreConfig, MAX_COLLISION_SUFFIX};
use crate::events::{Event, EventDispatcher};
use crate::metadata::resolver::strip_generation_tag;
use crate::metadata::EditMetadata;

/// The output stem for a document: optional prefix, the video's base name
/// with any generation tag removed, optional suffix.
pub fn base_output_stem(metadata: &EditMetadata) -> String {
    let file_name = Path::new(&metadata.video_file_name);
    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| metadata.video_file_name.clone());
    let stem = strip_generation_tag(&stem);

    let settings = &metadata.encoding_settings;
    format!("{}{}{}", settings.output_prefix, stem, settings.output_suffix)
}

/// The file name for one group's output. The group-id suffix appears only
/// when the document produces more than one file.
pub fn group_output_name(metadata: &EditMetadata, group_id: u32, multiple_groups: bool) -> String {
    let stem = base_output_stem(metadata);
    if multiple_groups {
        format!("{stem}_group{group_id}.mp4")
    } else {
        format!("{stem}.mp4")
    }
}

/// Picks a path under `dir` that does not exist yet.
///
/// The candidate name is tried first, then `stem(1).ext` through
/// `stem(9999).ext`, and finally a timestamped name. Never silently
/// overwrites a previous output.
pub fn unique_output_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let extension = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for counter in 1..=MAX_COLLISION_SUFFIX {
        let numbered = dir.join(format!("{stem}({counter}){extension}"));
        if !numbered.exists() {
            log::debug!(
                "output name collision: {file_name} -> {}",
                numbered.display()
            );
            return numbered;
        }
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{stem}_{timestamp}{extension}"))
}

/// Deletes the processed document, and the source video when it lives
/// inside the watched share folder. Videos elsewhere are never touched.
/// Failures never fail the task; they surface as warning events.
pub fn clean_share_files(
    config: &CoreConfig,
    metadata: &EditMetadata,
    document_path: &Path,
    dispatcher: &EventDispatcher,
) {
    if let Err(e) = std::fs::remove_file(document_path) {
        warn_cleanup(
            dispatcher,
            format!(
                "failed to remove processed document {}: {e}",
                document_path.display()
            ),
        );
    }

    let video_path = Path::new(&metadata.video_path);
    if !path_is_inside(video_path, &config.share_dir) {
        log::debug!(
            "leaving video outside share folder untouched: {}",
            video_path.display()
        );
        return;
    }
    if let Err(e) = std::fs::remove_file(video_path) {
        warn_cleanup(
            dispatcher,
            format!(
                "failed to remove processed video {}: {e}",
                video_path.display()
            ),
        );
    }
}

fn warn_cleanup(dispatcher: &EventDispatcher, message: String) {
    log::warn!("{message}");
    dispatcher.emit(Event::Warning { message });
}

fn path_is_inside(path: &Path, dir: &Path) -> bool {
    let canonical_path = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => return false,
    };
    let canonical_dir = match dir.canonicalize() {
        Ok(d) => d,
        Err(_) => return false,
    };
    canonical_path.starts_with(canonical_dir)
}
