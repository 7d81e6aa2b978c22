//! Typed model of one edit document.
//!
//! An edit document is produced by the companion mobile editor and describes
//! how a source video should be cropped, rotated, trimmed, and assembled.
//! Documents are JSON; field names are stable camelCase identifiers and
//! unknown extra fields are tolerated.

pub mod resolver;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{parse_error, CoreError, CoreResult};

/// File extensions the resolver accepts as video sources.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v"];

/// One edit document, parsed from JSON and resolved against the filesystem.
///
/// Immutable once resolved, except for `video_path` which the resolver writes
/// exactly once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditMetadata {
    pub id: String,
    pub video_file_name: String,
    /// Local path once resolved; may arrive empty or as an `smb://` locator.
    pub video_path: String,
    #[serde(alias = "metadataVersion")]
    pub format_version: String,
    /// Dimensions of the original source, used to resolve conditional scale
    /// expressions ahead of invocation.
    pub video_width: u32,
    pub video_height: u32,
    /// Document-level rotation from older schema versions. A group whose own
    /// rotation is `None` inherits this value.
    pub video_rotation: Rotation,
    /// Which corner `centerY` is measured from. Versioned explicitly rather
    /// than inferred from `format_version`.
    pub crop_origin: CropOrigin,
    /// Group id 0 is reserved for unassigned segments and never processed.
    pub groups: BTreeMap<u32, GroupInfo>,
    pub segments: Vec<Segment>,
    pub output_mode: OutputMode,
    /// Required when `output_mode` is `Merge`.
    pub reference_resolution: Option<ReferenceResolution>,
    pub encoding_settings: EncodingSettings,
    /// Set when the video was located through a remote locator; outputs then
    /// land next to the video instead of the configured output directory.
    #[serde(skip)]
    pub remote_source: bool,
}

impl EditMetadata {
    /// Checks the structural invariants of a freshly parsed document.
    ///
    /// Every segment must reference group 0 (ignored) or an existing group,
    /// segment times must be ordered, and referenced groups need nonzero
    /// dimensions.
    pub fn validate(&self, document_path: &std::path::Path) -> CoreResult<()> {
        for (index, segment) in self.segments.iter().enumerate() {
            if segment.end_time <= segment.start_time {
                return Err(parse_error(
                    document_path,
                    format!(
                        "segment {index}: endTime {} is not after startTime {}",
                        segment.end_time, segment.start_time
                    ),
                ));
            }
            if segment.group_id == 0 {
                continue;
            }
            match self.groups.get(&segment.group_id) {
                None => {
                    return Err(parse_error(
                        document_path,
                        format!("segment {index} references unknown group {}", segment.group_id),
                    ));
                }
                Some(group) if group.width == 0 || group.height == 0 => {
                    return Err(parse_error(
                        document_path,
                        format!("group {} has zero dimensions", segment.group_id),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Groups eligible for processing: id != 0 and at least one segment,
    /// ascending by id. Segments within each group are ordered by start time,
    /// ties broken by end time.
    pub fn active_groups(&self) -> Vec<(&GroupInfo, Vec<&Segment>)> {
        self.groups
            .iter()
            .filter(|(id, _)| **id != 0)
            .filter_map(|(id, group)| {
                let mut segments: Vec<&Segment> = self
                    .segments
                    .iter()
                    .filter(|s| s.group_id == *id)
                    .collect();
                if segments.is_empty() {
                    return None;
                }
                segments.sort_by(|a, b| {
                    a.start_time
                        .total_cmp(&b.start_time)
                        .then(a.end_time.total_cmp(&b.end_time))
                });
                Some((group, segments))
            })
            .collect()
    }
}

/// A time-bounded crop instruction within the source video.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Segment {
    /// Crop-rectangle center in source-frame coordinates.
    pub center_x: i32,
    pub center_y: i32,
    /// 0 means unassigned; the segment is skipped.
    pub group_id: u32,
    /// Seconds.
    pub start_time: f64,
    pub end_time: f64,
}

/// A named crop/rotation profile segments reference for their target geometry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupInfo {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
}

impl GroupInfo {
    /// The frame size after rotation: CW90/CW270 swap width and height.
    /// Only used for merge-mode resolution matching.
    pub fn rotated_size(&self) -> (u32, u32) {
        match self.rotation {
            Rotation::CW90 | Rotation::CW270 => (self.height, self.width),
            Rotation::None | Rotation::CW180 => (self.width, self.height),
        }
    }
}

/// Clockwise rotation applied after cropping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    CW90,
    CW180,
    CW270,
}

impl Rotation {
    /// The transpose filters realizing this rotation, in application order.
    pub fn transpose_filters(self) -> &'static [&'static str] {
        match self {
            Rotation::None => &[],
            Rotation::CW90 => &["transpose=1"],
            Rotation::CW180 => &["transpose=2", "transpose=2"],
            Rotation::CW270 => &["transpose=2"],
        }
    }
}

/// Which corner of the source frame `centerY` is measured from.
///
/// Older documents used a bottom-left origin; the convention is carried as an
/// explicit field so it is never guessed from the schema version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CropOrigin {
    #[default]
    TopLeft,
    BottomLeft,
}

/// Output topology for a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    /// One output file per group.
    #[default]
    Separate,
    /// All groups normalized to the reference resolution and concatenated
    /// into a single timeline.
    Merge,
}

/// The target frame size all merge-mode segments are scaled/padded to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceResolution {
    pub width: u32,
    pub height: u32,
}

/// Per-document encoding preferences. Absent or non-positive values fall
/// back to the process-wide defaults in `CoreConfig`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncodingSettings {
    pub codec: Option<VideoCodec>,
    /// Constant-quality value; <= 0 means "use the process default".
    pub cq: i32,
    pub limit_frame_rate: bool,
    pub target_fps: u32,
    pub audio_codec: Option<AudioCodec>,
    pub output_prefix: String,
    pub output_suffix: String,
    pub enable_scaling: bool,
    /// ffmpeg scale expression, possibly conditional on source dimensions.
    pub scale_filter: String,
}

/// Target video codec. Closed set so adding a backend is a compile-checked
/// enum extension rather than a string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    #[serde(rename = "H264_CPU")]
    H264Cpu,
    #[serde(rename = "H264_NVIDIA")]
    H264Nvidia,
    #[serde(rename = "H264_AMD")]
    H264Amd,
    #[serde(rename = "H265_CPU")]
    H265Cpu,
    #[serde(rename = "H265_NVIDIA")]
    H265Nvidia,
    #[serde(rename = "H265_AMD")]
    H265Amd,
    Copy,
}

impl VideoCodec {
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            VideoCodec::H264Cpu => "libx264",
            VideoCodec::H264Nvidia => "h264_nvenc",
            VideoCodec::H264Amd => "h264_amf",
            VideoCodec::H265Cpu => "libx265",
            VideoCodec::H265Nvidia => "hevc_nvenc",
            VideoCodec::H265Amd => "hevc_amf",
            VideoCodec::Copy => "copy",
        }
    }

    /// Passthrough re-multiplexes without re-encoding and cannot apply a
    /// filter graph.
    pub fn is_copy(self) -> bool {
        matches!(self, VideoCodec::Copy)
    }

    /// CPU encoders take `-crf`, the hardware encoders `-cq`.
    pub fn quality_flag(self) -> &'static str {
        match self {
            VideoCodec::H264Cpu | VideoCodec::H265Cpu | VideoCodec::Copy => "-crf",
            VideoCodec::H264Nvidia
            | VideoCodec::H264Amd
            | VideoCodec::H265Nvidia
            | VideoCodec::H265Amd => "-cq",
        }
    }
}

/// Target audio codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    #[serde(rename = "AAC")]
    Aac,
    Copy,
}

impl AudioCodec {
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Copy => "copy",
        }
    }
}

/// Parses an edit document from a JSON string.
pub fn parse_document(document_path: &std::path::Path, json: &str) -> CoreResult<EditMetadata> {
    let metadata: EditMetadata =
        serde_json::from_str(json).map_err(|e| parse_error(document_path, e.to_string()))?;
    metadata.validate(document_path)?;
    Ok(metadata)
}

/// Reads and parses an edit document from disk.
pub fn load_document(document_path: &std::path::Path) -> CoreResult<EditMetadata> {
    let json = std::fs::read_to_string(document_path).map_err(CoreError::Io)?;
    parse_document(document_path, &json)
}

/// Returns the output directory for a resolved document: next to the video
/// for remote-located sources, otherwise the configured directory.
pub fn output_dir_for(metadata: &EditMetadata, configured: &std::path::Path) -> PathBuf {
    if metadata.remote_source {
        if let Some(parent) = std::path::Path::new(&metadata.video_path).parent() {
            return parent.to_path_buf();
        }
    }
    configured.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn doc(json: &str) -> CoreResult<EditMetadata> {
        parse_document(Path::new("/tmp/edit.json"), json)
    }

    #[test]
    fn parses_minimal_document() {
        let metadata = doc(r#"{
            "id": "abc",
            "videoFileName": "clip.mp4",
            "videoWidth": 1920,
            "videoHeight": 1080,
            "groups": {"1": {"id": 1, "width": 720, "height": 1280}},
            "segments": [
                {"centerX": 960, "centerY": 540, "groupId": 1, "startTime": 1.0, "endTime": 4.0}
            ]
        }"#)
        .unwrap();

        assert_eq!(metadata.output_mode, OutputMode::Separate);
        assert_eq!(metadata.crop_origin, CropOrigin::TopLeft);
        assert_eq!(metadata.groups[&1].width, 720);
        assert!(metadata.encoding_settings.codec.is_none());
    }

    #[test]
    fn tolerates_unknown_fields() {
        let metadata = doc(r#"{
            "videoFileName": "clip.mp4",
            "videoWidth": 1280,
            "videoHeight": 720,
            "someFutureKnob": {"nested": true},
            "groups": {},
            "segments": []
        }"#)
        .unwrap();
        assert_eq!(metadata.video_width, 1280);
    }

    #[test]
    fn rejects_segment_with_unknown_group() {
        let err = doc(r#"{
            "videoFileName": "clip.mp4",
            "videoWidth": 1280,
            "videoHeight": 720,
            "groups": {"1": {"id": 1, "width": 100, "height": 100}},
            "segments": [
                {"centerX": 0, "centerY": 0, "groupId": 7, "startTime": 0.0, "endTime": 1.0}
            ]
        }"#)
        .unwrap_err();
        assert!(matches!(err, CoreError::Parse { .. }));
    }

    #[test]
    fn rejects_inverted_segment_times() {
        let err = doc(r#"{
            "videoFileName": "clip.mp4",
            "videoWidth": 1280,
            "videoHeight": 720,
            "groups": {"1": {"id": 1, "width": 100, "height": 100}},
            "segments": [
                {"centerX": 0, "centerY": 0, "groupId": 1, "startTime": 5.0, "endTime": 5.0}
            ]
        }"#)
        .unwrap_err();
        assert!(matches!(err, CoreError::Parse { .. }));
    }

    #[test]
    fn active_groups_skip_group_zero_and_sort_segments() {
        let metadata = doc(r#"{
            "videoFileName": "clip.mp4",
            "videoWidth": 1920,
            "videoHeight": 1080,
            "groups": {
                "0": {"id": 0, "width": 10, "height": 10},
                "2": {"id": 2, "width": 300, "height": 300},
                "1": {"id": 1, "width": 200, "height": 200}
            },
            "segments": [
                {"centerX": 0, "centerY": 0, "groupId": 2, "startTime": 9.0, "endTime": 10.0},
                {"centerX": 0, "centerY": 0, "groupId": 0, "startTime": 0.0, "endTime": 1.0},
                {"centerX": 0, "centerY": 0, "groupId": 2, "startTime": 3.0, "endTime": 4.0},
                {"centerX": 0, "centerY": 0, "groupId": 2, "startTime": 3.0, "endTime": 3.5},
                {"centerX": 0, "centerY": 0, "groupId": 1, "startTime": 5.0, "endTime": 6.0}
            ]
        }"#)
        .unwrap();

        let groups = metadata.active_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.id, 1);
        assert_eq!(groups[1].0.id, 2);

        let starts: Vec<(f64, f64)> = groups[1]
            .1
            .iter()
            .map(|s| (s.start_time, s.end_time))
            .collect();
        assert_eq!(starts, vec![(3.0, 3.5), (3.0, 4.0), (9.0, 10.0)]);
    }

    #[test]
    fn group_with_no_segments_is_not_active() {
        let metadata = doc(r#"{
            "videoFileName": "clip.mp4",
            "videoWidth": 1920,
            "videoHeight": 1080,
            "groups": {
                "1": {"id": 1, "width": 200, "height": 200},
                "2": {"id": 2, "width": 300, "height": 300}
            },
            "segments": [
                {"centerX": 0, "centerY": 0, "groupId": 2, "startTime": 0.0, "endTime": 1.0}
            ]
        }"#)
        .unwrap();
        let groups = metadata.active_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0.id, 2);
    }

    #[test]
    fn rotated_size_swaps_for_quarter_turns() {
        let group = GroupInfo {
            id: 1,
            width: 1280,
            height: 720,
            rotation: Rotation::CW90,
        };
        assert_eq!(group.rotated_size(), (720, 1280));

        let group = GroupInfo {
            rotation: Rotation::CW180,
            ..group
        };
        assert_eq!(group.rotated_size(), (1280, 720));
    }

    #[test]
    fn codec_names_are_exhaustive() {
        assert_eq!(VideoCodec::H265Nvidia.ffmpeg_name(), "hevc_nvenc");
        assert_eq!(VideoCodec::H264Cpu.quality_flag(), "-crf");
        assert_eq!(VideoCodec::H265Amd.quality_flag(), "-cq");
        assert!(VideoCodec::Copy.is_copy());
        assert_eq!(AudioCodec::Aac.ffmpeg_name(), "aac");
    }

    #[test]
    fn codec_enums_use_wire_names() {
        let settings: EncodingSettings = serde_json::from_str(
            r#"{"codec": "H265_NVIDIA", "audioCodec": "AAC", "cq": 30}"#,
        )
        .unwrap();
        assert_eq!(settings.codec, Some(VideoCodec::H265Nvidia));
        assert_eq!(settings.audio_codec, Some(AudioCodec::Aac));
        assert_eq!(settings.cq, 30);
    }
}
