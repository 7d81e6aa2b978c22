//! Filter construction: crop rectangles, conditional scale resolution, and
//! merge-mode scale+pad normalization.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CoreError, CoreResult};
use crate::metadata::{CropOrigin, EditMetadata, GroupInfo, ReferenceResolution, Segment};

/// A crop rectangle in source-frame pixels. Width and height always come
/// from the group; only the position depends on the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

/// Computes the clamped crop rectangle for one segment.
///
/// `cropY` depends on the document's coordinate origin: top-left documents
/// measure `centerY` downward, bottom-left documents upward.
pub fn crop_rect(metadata: &EditMetadata, segment: &Segment, group: &GroupInfo) -> CropRect {
    let half_w = i64::from(group.width) / 2;
    let half_h = i64::from(group.height) / 2;

    let x = i64::from(segment.center_x) - half_w;
    let y = match metadata.crop_origin {
        CropOrigin::TopLeft => i64::from(segment.center_y) - half_h,
        CropOrigin::BottomLeft => {
            i64::from(metadata.video_height) - i64::from(segment.center_y) - half_h
        }
    };

    CropRect {
        x: x.max(0) as u32,
        y: y.max(0) as u32,
        width: group.width,
        height: group.height,
    }
}

static GT_CONDITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^gt\((iw|ih),(\d+)\)$").expect("valid gt pattern"));

/// Resolves a scale expression against the source dimensions.
///
/// The mobile side may emit conditional expressions such as
/// `scale=-1:'if(gt(ih,1300),1280,ih)'`. The external encoder is never asked
/// to evaluate those; the condition is decided here and replaced by a
/// concrete `scale=W:H`. Returns `None` when the resolved expression leaves
/// the source dimensions unchanged. Non-conditional expressions the encoder
/// can evaluate itself (arithmetic, `force_original_aspect_ratio`, ...) are
/// forwarded unchanged.
pub fn resolve_scale_filter(
    expression: &str,
    video_width: u32,
    video_height: u32,
) -> CoreResult<Option<String>> {
    let trimmed = expression.trim();
    let body = trimmed.strip_prefix("scale=").unwrap_or(trimmed);
    let iw = i64::from(video_width);
    let ih = i64::from(video_height);

    let parts = split_top_level(body, ':');
    let evaluated = if parts.len() == 2 {
        eval_term(&parts[0], iw, ih).zip(eval_term(&parts[1], iw, ih))
    } else {
        None
    };

    match evaluated {
        Some((width, height)) => {
            let width_is_noop = width == -1 || width == iw;
            let height_is_noop = height == -1 || height == ih;
            if width_is_noop && height_is_noop {
                Ok(None)
            } else {
                Ok(Some(format!("scale={width}:{height}")))
            }
        }
        None if body.contains("if(") => {
            Err(CoreError::ScaleExpression(expression.to_string()))
        }
        None => Ok(Some(format!("scale={body}"))),
    }
}

/// Evaluates one scale term: an integer, `iw`/`ih`, or
/// `if(gt(iw|ih,N),then,else)` where the branches are themselves terms.
fn eval_term(term: &str, iw: i64, ih: i64) -> Option<i64> {
    let term = term.trim().trim_matches('\'').trim();
    match term {
        "iw" => return Some(iw),
        "ih" => return Some(ih),
        _ => {}
    }
    if let Some(inner) = term.strip_prefix("if(").and_then(|t| t.strip_suffix(')')) {
        let args = split_top_level(inner, ',');
        if args.len() != 3 {
            return None;
        }
        let captures = GT_CONDITION.captures(args[0].trim())?;
        let operand = if &captures[1] == "iw" { iw } else { ih };
        let threshold: i64 = captures[2].parse().ok()?;
        let branch = if operand > threshold { &args[1] } else { &args[2] };
        return eval_term(branch, iw, ih);
    }
    term.parse().ok()
}

/// Splits on `separator` at parenthesis depth zero.
fn split_top_level(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in input.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if c == separator && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

/// Builds the scale+pad filter normalizing a group's rotated frame to the
/// merge reference resolution.
///
/// Fit-inside with preserved aspect: uniform ratio `min(refW/w, refH/h)`,
/// scaled dimensions floored to even (codec alignment), then centered black
/// padding. Emits nothing when the rotated size already matches.
pub fn merge_scale_pad(
    rotated: (u32, u32),
    reference: &ReferenceResolution,
) -> Option<String> {
    let (actual_w, actual_h) = rotated;
    if actual_w == reference.width && actual_h == reference.height {
        return None;
    }

    let ratio = f64::min(
        f64::from(reference.width) / f64::from(actual_w),
        f64::from(reference.height) / f64::from(actual_h),
    );
    let scaled_w = ((f64::from(actual_w) * ratio).floor() as u32) & !1;
    let scaled_h = ((f64::from(actual_h) * ratio).floor() as u32) & !1;

    let scale = format!("scale={scaled_w}:{scaled_h}");
    if scaled_w == reference.width && scaled_h == reference.height {
        return Some(scale);
    }

    let pad_x = (reference.width - scaled_w) / 2;
    let pad_y = (reference.height - scaled_h) / 2;
    Some(format!(
        "{scale},pad={}:{}:{pad_x}:{pad_y}",
        reference.width, reference.height
    ))
}
