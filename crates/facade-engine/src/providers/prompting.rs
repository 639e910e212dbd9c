//! Instruction text shared by every provider variant, so that the same
//! edit intent carries the same meaning whichever wire format it uses.

use serde_json::Value;

use crate::intent::{EditIntent, MAX_INTENSITY};

pub const MASK_INSTRUCTION: &str = "The previous image is a black-and-white mask for the \
base image. White pixels mark the only region you may edit. Black pixels must remain exactly \
unchanged.";

pub const OVERLAY_MASKED_INSTRUCTION: &str = "The previous image is an overlay element. \
Integrate it into the white masked region, matching the scene's perspective, scale and \
lighting.";

pub const OVERLAY_SCENE_INSTRUCTION: &str = "The previous image is an overlay element. \
Integrate it naturally into the scene, matching perspective, scale and lighting.";

pub const MAX_SUGGESTIONS: usize = 3;

/// Natural-language strength hint. Full intensity needs no qualifier.
pub fn intensity_qualifier(intensity: u8) -> Option<String> {
    if intensity >= MAX_INTENSITY {
        return None;
    }
    Some(format!("Modification intensity around {intensity}%."))
}

/// Free-text instruction for an unmasked edit, with the intensity hint.
pub fn unmasked_edit_prompt(intent: &EditIntent) -> String {
    match intensity_qualifier(intent.intensity) {
        Some(qualifier) => format!("{} {qualifier}", intent.prompt_text),
        None => intent.prompt_text.clone(),
    }
}

pub fn refine_instruction(prompt: &str, context: &str) -> String {
    let context = context.trim();
    let context_line = if context.is_empty() {
        String::new()
    } else {
        format!("Style context: {context}.\n")
    };
    format!(
        "You help architects write prompts for an image model that edits architectural \
renderings.\nRewrite the user's text into exactly {MAX_SUGGESTIONS} distinct, more descriptive \
prompts. Keep each under 60 words and keep the user's intent.\n{context_line}\
Return JSON only (no markdown) with this exact schema: {{\"suggestions\": [\"string\", \
\"string\", \"string\"]}}\nUser text: {}",
        prompt.trim()
    )
}

/// Best-effort parse of a refinement reply. Falls back to the raw text as
/// a single suggestion when the reply is not the requested JSON.
pub fn parse_suggestions(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let unfenced = strip_code_fence(trimmed);
    let parsed = serde_json::from_str::<Value>(unfenced)
        .ok()
        .and_then(|value| suggestions_from_value(&value));
    match parsed {
        Some(suggestions) if !suggestions.is_empty() => suggestions,
        _ => vec![trimmed.to_string()],
    }
}

fn suggestions_from_value(value: &Value) -> Option<Vec<String>> {
    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(object) => object
            .get("suggestions")
            .and_then(Value::as_array)
            .or_else(|| object.values().find_map(Value::as_array))?,
        _ => return None,
    };
    let mut out: Vec<String> = Vec::new();
    for row in rows {
        let Some(text) = row.as_str().map(str::trim).filter(|text| !text.is_empty()) else {
            continue;
        };
        if out.iter().any(|existing| existing == text) {
            continue;
        }
        out.push(text.to_string());
        if out.len() == MAX_SUGGESTIONS {
            break;
        }
    }
    Some(out)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim().strip_suffix("```").unwrap_or(rest).trim()
}
