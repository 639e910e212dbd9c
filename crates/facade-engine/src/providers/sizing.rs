//! Resolution presets (`1K`, `2K`, `4K`, `WxH`, `W:H`) mapped onto what
//! each provider can actually render.

use facade_contracts::errors::{FacadeError, Result};

const GEMINI_RATIOS: [(&str, f64); 10] = [
    ("1:1", 1.0),
    ("2:3", 2.0 / 3.0),
    ("3:2", 3.0 / 2.0),
    ("3:4", 3.0 / 4.0),
    ("4:3", 4.0 / 3.0),
    ("4:5", 4.0 / 5.0),
    ("5:4", 5.0 / 4.0),
    ("9:16", 9.0 / 16.0),
    ("16:9", 16.0 / 9.0),
    ("21:9", 21.0 / 9.0),
];

const OPENAI_SIZES: [(&str, f64); 3] = [
    ("1024x1024", 1.0),
    ("1024x1536", 1024.0 / 1536.0),
    ("1536x1024", 1536.0 / 1024.0),
];

pub(crate) fn push_unique_warning(warnings: &mut Vec<String>, message: String) {
    if message.trim().is_empty() || warnings.iter().any(|existing| existing == &message) {
        return;
    }
    warnings.push(message);
}

pub(crate) fn parse_dims(raw: &str) -> Option<(u32, u32)> {
    let (left, right) = raw.split_once('x')?;
    let width = left.trim().parse::<u32>().ok()?;
    let height = right.trim().parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

pub(crate) fn parse_ratio(raw: &str) -> Option<(u32, u32)> {
    let (left, right) = raw.split_once(':').or_else(|| raw.split_once('/'))?;
    let first = left.trim().parse::<u32>().ok()?;
    let second = right.trim().parse::<u32>().ok()?;
    if first == 0 || second == 0 {
        return None;
    }
    Some((first, second))
}

/// Largest side a locally rendered image may have.
pub(crate) const MAX_PIXEL_SIDE: u32 = 8192;

/// Pixel size for locally rendered output. Presets are square; ratios
/// keep the preset's long side.
pub(crate) fn pixel_size(resolution: &str) -> Result<(u32, u32)> {
    let normalized = resolution.trim().to_ascii_lowercase();
    if let Some((width, height)) = parse_dims(&normalized) {
        if width > MAX_PIXEL_SIDE || height > MAX_PIXEL_SIDE {
            return Err(FacadeError::input(format!(
                "resolution {width}x{height} exceeds the {MAX_PIXEL_SIDE}px limit per side"
            )));
        }
        return Ok((width, height));
    }
    let long_side: u32 = match normalized.as_str() {
        "1k" => 1024,
        "4k" => 4096,
        _ => 2048,
    };
    let Some((w, h)) = parse_ratio(&normalized) else {
        return Ok((long_side, long_side));
    };
    let short_side = |minor: u32, major: u32| -> u32 {
        let scaled = u64::from(long_side) * u64::from(minor) / u64::from(major);
        // minor <= major, so scaled <= long_side
        u32::try_from(scaled).unwrap_or(long_side).max(1)
    };
    Ok(if w >= h {
        (long_side, short_side(h, w))
    } else {
        (short_side(w, h), long_side)
    })
}

fn nearest(candidates: &[(&'static str, f64)], target: f64) -> &'static str {
    let mut best_key = candidates[0].0;
    let mut best_delta = f64::MAX;
    for (key, value) in candidates {
        let delta = (value - target).abs();
        if delta < best_delta {
            best_key = *key;
            best_delta = delta;
        }
    }
    best_key
}

/// Gemini only accepts a fixed set of aspect ratios. Quality presets carry
/// no ratio and leave the provider default in place.
pub(crate) fn gemini_aspect_ratio(resolution: &str, warnings: &mut Vec<String>) -> Option<String> {
    let normalized = resolution.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" | "1k" | "2k" | "4k" => return None,
        "portrait" | "tall" => return Some("9:16".to_string()),
        "landscape" | "wide" => return Some("16:9".to_string()),
        "square" => return Some("1:1".to_string()),
        _ => {}
    }

    let target = if let Some((left, right)) = parse_ratio(&normalized) {
        let direct = format!("{left}:{right}");
        if GEMINI_RATIOS.iter().any(|(candidate, _)| *candidate == direct) {
            return Some(direct);
        }
        f64::from(left) / f64::from(right)
    } else if let Some((width, height)) = parse_dims(&normalized) {
        f64::from(width) / f64::from(height)
    } else {
        push_unique_warning(
            warnings,
            format!("Gemini resolution '{resolution}' not understood; using provider default."),
        );
        return None;
    };

    let best = nearest(&GEMINI_RATIOS, target);
    push_unique_warning(warnings, format!("Gemini aspect ratio snapped to {best}."));
    Some(best.to_string())
}

pub(crate) fn openai_size(resolution: &str, warnings: &mut Vec<String>) -> String {
    let normalized = resolution.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" | "square" | "1:1" => return "1024x1024".to_string(),
        "portrait" | "tall" => return "1024x1536".to_string(),
        "landscape" | "wide" => return "1536x1024".to_string(),
        "1k" | "2k" | "4k" => {
            push_unique_warning(
                warnings,
                format!("OpenAI ignores {} presets; using 1024x1024.", normalized.to_uppercase()),
            );
            return "1024x1024".to_string();
        }
        _ => {}
    }

    let target = if let Some((width, height)) = parse_dims(&normalized) {
        let key = format!("{width}x{height}");
        if OPENAI_SIZES.iter().any(|(candidate, _)| *candidate == key) {
            return key;
        }
        f64::from(width) / f64::from(height)
    } else if let Some((left, right)) = parse_ratio(&normalized) {
        f64::from(left) / f64::from(right)
    } else {
        push_unique_warning(warnings, "OpenAI size unsupported; using 1024x1024.".to_string());
        return "1024x1024".to_string();
    };

    let best = nearest(&OPENAI_SIZES, target);
    push_unique_warning(warnings, format!("OpenAI size snapped to {best}."));
    best.to_string()
}
