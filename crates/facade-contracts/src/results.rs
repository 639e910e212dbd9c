use serde::{Deserialize, Serialize};

use crate::asset::ImageAsset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Create,
    Enhance,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Enhance => "enhance",
        }
    }
}

/// The single current outcome of a remote call. Holds its own copies of
/// every input so that regenerate can replay the request exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResult {
    pub kind: ResultKind,
    pub prompt_text: String,
    pub style_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_image: Option<ImageAsset>,
    pub output_image: ImageAsset,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<ImageAsset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<ImageAsset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<u8>,
}

impl GeneratedResult {
    pub fn create(
        prompt_text: &str,
        style_label: &str,
        resolution: &str,
        output_image: ImageAsset,
    ) -> Self {
        Self {
            kind: ResultKind::Create,
            prompt_text: prompt_text.to_string(),
            style_label: style_label.to_string(),
            resolution: Some(resolution.to_string()),
            input_image: None,
            output_image,
            overlay: None,
            mask: None,
            intensity: None,
        }
    }

    /// Summary without image payloads, used for session events.
    pub fn manifest(&self) -> serde_json::Value {
        let asset_summary = |asset: &ImageAsset| {
            serde_json::json!({
                "name": asset.name,
                "mime_type": asset.mime_type,
                "bytes": asset.byte_len(),
            })
        };
        serde_json::json!({
            "kind": self.kind.as_str(),
            "prompt": self.prompt_text,
            "style": self.style_label,
            "resolution": self.resolution,
            "intensity": self.intensity,
            "input_image": self.input_image.as_ref().map(asset_summary),
            "output_image": asset_summary(&self.output_image),
            "overlay": self.overlay.as_ref().map(asset_summary),
            "mask": self.mask.as_ref().map(asset_summary),
        })
    }
}
