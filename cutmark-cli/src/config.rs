//! Builds a core configuration from parsed arguments.

use std::path::PathBuf;

use cutmark_core::metadata::VideoCodec;
use cutmark_core::CoreConfig;

use crate::cli::EncodingArgs;

/// Maps a codec name from the command line onto the core codec enum.
pub fn parse_video_codec(name: &str) -> Result<VideoCodec, String> {
    match name.to_ascii_lowercase().as_str() {
        "h264" | "libx264" => Ok(VideoCodec::H264Cpu),
        "h264_nvenc" => Ok(VideoCodec::H264Nvidia),
        "h264_amf" => Ok(VideoCodec::H264Amd),
        "h265" | "hevc" | "libx265" => Ok(VideoCodec::H265Cpu),
        "hevc_nvenc" | "h265_nvenc" => Ok(VideoCodec::H265Nvidia),
        "hevc_amf" | "h265_amf" => Ok(VideoCodec::H265Amd),
        "copy" => Ok(VideoCodec::Copy),
        other => Err(format!("unknown video codec '{other}'")),
    }
}

/// Assembles the core configuration for either subcommand.
pub fn build_config(
    share_dir: PathBuf,
    output_dir: PathBuf,
    encoding: &EncodingArgs,
) -> Result<CoreConfig, String> {
    let mut config = CoreConfig::new(share_dir, output_dir);

    config.ffmpeg_path = encoding.ffmpeg.clone();
    config.temp_dir = encoding.temp_dir.clone();
    if let Some(name) = &encoding.codec {
        config.video_codec = parse_video_codec(name)?;
    }
    if let Some(quality) = encoding.quality {
        config.quality = quality;
    }
    if let Some(preset) = &encoding.preset {
        config.preset = preset.clone();
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}
