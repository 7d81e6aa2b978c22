//! Loads an edit document and resolves its video reference to a local path.
//!
//! The mobile editor cannot know where the video landed on this machine, so
//! the document's `videoPath`/`videoFileName` are treated as hints and the
//! resolver walks a fixed strategy order: keep an existing path, translate a
//! remote locator, search the document's directory by stem, then accept any
//! video file in that directory.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use super::{load_document, EditMetadata, VIDEO_EXTENSIONS};
use crate::error::{CoreError, CoreResult};

/// Bracketed generation tags the mobile side appends to filenames,
/// e.g. `clip[VCM_a1b2].mp4`.
static GENERATION_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[VCM_[A-Za-z0-9]+\]").expect("valid generation tag pattern"));

/// Loads the document at `document_path` and resolves `video_path` to an
/// existing local file.
pub fn resolve(document_path: &Path) -> CoreResult<EditMetadata> {
    let mut metadata = load_document(document_path)?;
    resolve_video_path(&mut metadata, document_path)?;
    Ok(metadata)
}

/// Removes any `[VCM_...]` generation tag from a filename.
pub fn strip_generation_tag(name: &str) -> String {
    GENERATION_TAG.replace_all(name, "").into_owned()
}

fn resolve_video_path(metadata: &mut EditMetadata, document_path: &Path) -> CoreResult<()> {
    if !metadata.video_path.is_empty() {
        if let Some(unc) = smb_to_unc(&metadata.video_path) {
            // Remote locators are authoritative: no directory fallback.
            if unc.is_file() {
                metadata.video_path = unc.to_string_lossy().into_owned();
                metadata.remote_source = true;
                return Ok(());
            }
            return Err(CoreError::VideoNotFound(metadata.video_path.clone()));
        }
        if Path::new(&metadata.video_path).is_file() {
            return Ok(());
        }
    }

    let directory = document_path
        .parent()
        .ok_or_else(|| CoreError::PathError(format!("{} has no parent", document_path.display())))?;
    let file_name = strip_generation_tag(&metadata.video_file_name);

    // Exact name in the document's directory.
    let candidate = directory.join(&file_name);
    if candidate.is_file() {
        metadata.video_path = candidate.to_string_lossy().into_owned();
        return Ok(());
    }

    let stem = Path::new(&file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut entries = video_files_in(directory)?;
    entries.sort();

    // Same stem, any known video extension.
    if !stem.is_empty() {
        if let Some(found) = entries.iter().find(|p| {
            p.file_stem()
                .map(|s| s.to_string_lossy() == stem.as_str())
                .unwrap_or(false)
        }) {
            metadata.video_path = found.to_string_lossy().into_owned();
            return Ok(());
        }
    }

    // Last resort: any video file sitting next to the document.
    if let Some(found) = entries.first() {
        metadata.video_path = found.to_string_lossy().into_owned();
        return Ok(());
    }

    Err(CoreError::VideoNotFound(metadata.video_file_name.clone()))
}

fn video_files_in(directory: &Path) -> CoreResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && has_video_extension(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Translates an `smb://host/share/path` locator into a UNC path.
/// Returns `None` for anything that is not an smb locator.
fn smb_to_unc(locator: &str) -> Option<PathBuf> {
    let rest = locator.strip_prefix("smb://")?;
    if rest.is_empty() {
        return None;
    }
    let unc = format!(r"\\{}", rest.replace('/', r"\"));
    Some(PathBuf::from(unc))
}
