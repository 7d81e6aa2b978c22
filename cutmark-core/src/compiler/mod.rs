//! Command compilation: turns resolved metadata into concrete encoder
//! argument lists.
//!
//! Compilation is pure. Nothing here touches the filesystem or spawns a
//! process; the output is a `Vec<String>` of arguments that the processing
//! layer hands to the external encoder. That keeps every filter and flag
//! decision unit-testable without ffmpeg installed.

pub mod filters;

use std::path::Path;

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::metadata::{
    AudioCodec, EditMetadata, GroupInfo, OutputMode, Rotation, Segment, VideoCodec,
};

pub use filters::{crop_rect, merge_scale_pad, resolve_scale_filter, CropRect};

/// Per-document settings merged over the process-wide defaults.
#[derive(Debug, Clone, Copy)]
pub struct EffectiveSettings {
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    pub quality: u32,
}

/// Resolves the effective codecs and quality for a document. Per-document
/// values win only when present (codecs) or positive (quality).
pub fn effective_settings(metadata: &EditMetadata, config: &CoreConfig) -> EffectiveSettings {
    let settings = &metadata.encoding_settings;
    EffectiveSettings {
        video_codec: settings.codec.unwrap_or(config.video_codec),
        audio_codec: settings.audio_codec.unwrap_or(config.audio_codec),
        quality: if settings.cq > 0 {
            settings.cq as u32
        } else {
            config.quality
        },
    }
}

/// Compiles the encoder invocation for a single segment.
///
/// Filter order is fixed: crop, then rotation, then scaling. Merge mode
/// scales to the document's reference resolution; separate mode applies the
/// document's own scale expression when scaling is enabled. A passthrough
/// video codec suppresses the entire filter chain.
pub fn build_encode_args(
    metadata: &EditMetadata,
    group: &GroupInfo,
    segment: &Segment,
    output: &Path,
    config: &CoreConfig,
) -> CoreResult<Vec<String>> {
    let effective = effective_settings(metadata, config);
    let mut chain: Vec<String> = Vec::new();

    if !effective.video_codec.is_copy() {
        chain.push(crop_rect(metadata, segment, group).filter());

        let rotation = match group.rotation {
            Rotation::None => metadata.video_rotation,
            explicit => explicit,
        };
        chain.extend(rotation.transpose_filters().iter().map(|f| f.to_string()));

        match metadata.output_mode {
            OutputMode::Merge => {
                let reference = metadata
                    .reference_resolution
                    .ok_or(CoreError::MergePrecondition)?;
                if let Some(filter) = merge_scale_pad(group.rotated_size(), &reference) {
                    chain.push(filter);
                }
            }
            OutputMode::Separate => {
                let settings = &metadata.encoding_settings;
                if settings.enable_scaling && !settings.scale_filter.is_empty() {
                    if let Some(filter) = resolve_scale_filter(
                        &settings.scale_filter,
                        metadata.video_width,
                        metadata.video_height,
                    )? {
                        chain.push(filter);
                    }
                }
            }
        }
    }

    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        metadata.video_path.clone(),
        "-ss".into(),
        format_seconds(segment.start_time),
        "-to".into(),
        format_seconds(segment.end_time),
    ];
    if !chain.is_empty() {
        args.push("-vf".into());
        args.push(chain.join(","));
    }
    args.push("-c:v".into());
    args.push(effective.video_codec.ffmpeg_name().into());
    if !effective.video_codec.is_copy() {
        args.push("-preset".into());
        args.push(config.preset.clone());
        args.push(effective.video_codec.quality_flag().into());
        args.push(effective.quality.to_string());

        let settings = &metadata.encoding_settings;
        if settings.limit_frame_rate && settings.target_fps > 0 {
            args.push("-r".into());
            args.push(settings.target_fps.to_string());
        }
    }
    args.push("-c:a".into());
    args.push(effective.audio_codec.ffmpeg_name().into());
    args.push(output.to_string_lossy().into_owned());
    Ok(args)
}

/// Compiles the stream-copy concat invocation over a concat list file.
/// Segments were already normalized to a common resolution, so no
/// re-encoding happens here.
pub fn build_concat_args(list_file: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_file.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Formats a cut point for `-ss`/`-to`. Whole seconds lose the trailing
/// `.0`; fractional values keep their shortest exact representation.
fn format_seconds(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{}", seconds as i64)
    } else {
        format!("{seconds}")
    }
}
