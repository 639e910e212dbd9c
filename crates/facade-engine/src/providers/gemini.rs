use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use facade_contracts::asset::ImageAsset;
use facade_contracts::errors::{FacadeError, Result};
use facade_contracts::providers::ProviderKind;
use facade_contracts::styles::compose_create_prompt;
use serde_json::{json, Value};
use tracing::debug;

use super::prompting::{
    parse_suggestions, refine_instruction, unmasked_edit_prompt, MASK_INSTRUCTION,
    OVERLAY_MASKED_INSTRUCTION, OVERLAY_SCENE_INSTRUCTION,
};
use super::sizing::gemini_aspect_ratio;
use super::{output_name, ImageProvider, ModelChoice};
use crate::config::ProviderCredentials;
use crate::intent::EditIntent;
use crate::mask::mask_for_base;
use crate::request::{Operation, ProviderOutput, ProviderRequest, RequestBody};
use crate::transport::{Auth, HttpTransport};

const PROVIDER: &str = "gemini";

/// Multimodal chat-style variant: every request is an ordered list of
/// inline images and text parts sent to `generateContent`.
pub struct GeminiProvider {
    credentials: ProviderCredentials,
    models: ModelChoice,
    transport: HttpTransport,
}

impl GeminiProvider {
    pub fn new(
        credentials: ProviderCredentials,
        models: ModelChoice,
        transport: HttpTransport,
    ) -> Self {
        Self {
            credentials,
            models,
            transport,
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.credentials.api_key.as_deref().ok_or_else(|| {
            FacadeError::configuration("GEMINI_API_KEY or GOOGLE_API_KEY not configured")
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!(
            "{}/{}:generateContent",
            self.credentials.api_base.trim_end_matches('/'),
            model_path
        )
    }

    fn request(
        &self,
        operation: Operation,
        model: &str,
        parts: Vec<Value>,
        generation_config: Value,
        warnings: Vec<String>,
    ) -> ProviderRequest {
        ProviderRequest {
            provider: ProviderKind::Gemini,
            operation,
            endpoint: self.endpoint_for_model(model),
            model: model.to_string(),
            body: RequestBody::Json(json!({
                "contents": [{ "role": "user", "parts": parts }],
                "generationConfig": generation_config,
            })),
            warnings,
        }
    }

    fn send_for_image(&self, request: &ProviderRequest, prompt: &str) -> Result<ImageAsset> {
        let api_key = self.api_key()?;
        let response = self.transport.send(request, Auth::GoogleApiKey(api_key))?;
        let (bytes, mime_type) = image_from_reply(&response)?;
        Ok(ImageAsset::from_bytes(
            output_name(PROVIDER, prompt, &mime_type),
            mime_type,
            &bytes,
        ))
    }
}

impl ImageProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn build_create_request(
        &self,
        prompt: &str,
        style: &str,
        resolution: &str,
    ) -> Result<ProviderRequest> {
        if prompt.trim().is_empty() {
            return Err(FacadeError::input("a prompt is required to generate an image"));
        }
        let mut warnings = Vec::new();
        let mut generation_config = json!({ "responseModalities": ["TEXT", "IMAGE"] });
        if let Some(ratio) = gemini_aspect_ratio(resolution, &mut warnings) {
            generation_config["imageConfig"] = json!({ "aspectRatio": ratio });
        }
        let parts = vec![json!({ "text": compose_create_prompt(prompt, style) })];
        Ok(self.request(
            Operation::Create,
            &self.models.image,
            parts,
            generation_config,
            warnings,
        ))
    }

    fn build_edit_request(
        &self,
        base: &ImageAsset,
        intent: &EditIntent,
    ) -> Result<ProviderRequest> {
        let mut parts = vec![inline_part(base)];
        match intent.mask.as_ref() {
            Some(mask) => {
                let mask = mask_for_base(mask, base)?.to_asset()?;
                parts.push(inline_part(&mask));
                parts.push(json!({ "text": MASK_INSTRUCTION }));
                if let Some(overlay) = intent.overlay.as_ref() {
                    parts.push(inline_part(overlay));
                    parts.push(json!({ "text": OVERLAY_MASKED_INSTRUCTION }));
                }
                parts.push(json!({ "text": intent.prompt_text }));
            }
            None => {
                if let Some(overlay) = intent.overlay.as_ref() {
                    parts.push(inline_part(overlay));
                    parts.push(json!({ "text": OVERLAY_SCENE_INSTRUCTION }));
                }
                parts.push(json!({ "text": unmasked_edit_prompt(intent) }));
            }
        }
        Ok(self.request(
            Operation::Edit,
            &self.models.image,
            parts,
            json!({ "responseModalities": ["TEXT", "IMAGE"] }),
            Vec::new(),
        ))
    }

    fn build_refine_request(&self, prompt: &str, context: &str) -> Result<ProviderRequest> {
        if prompt.trim().is_empty() {
            return Err(FacadeError::input("text to refine is required"));
        }
        let parts = vec![json!({ "text": refine_instruction(prompt, context) })];
        Ok(self.request(
            Operation::Refine,
            &self.models.text,
            parts,
            json!({
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "suggestions": { "type": "ARRAY", "items": { "type": "STRING" } }
                    },
                    "required": ["suggestions"]
                }
            }),
            Vec::new(),
        ))
    }

    fn generate_image_from_text(
        &self,
        prompt: &str,
        style: &str,
        resolution: &str,
    ) -> Result<ProviderOutput<ImageAsset>> {
        self.api_key()?;
        let request = self.build_create_request(prompt, style, resolution)?;
        let image = self.send_for_image(&request, prompt)?;
        Ok(ProviderOutput::new(image, &request))
    }

    fn edit_image(
        &self,
        base: &ImageAsset,
        intent: &EditIntent,
    ) -> Result<ProviderOutput<ImageAsset>> {
        self.api_key()?;
        let request = self.build_edit_request(base, intent)?;
        let image = self.send_for_image(&request, &intent.prompt_text)?;
        Ok(ProviderOutput::new(image, &request))
    }

    fn refine_text_prompt(
        &self,
        prompt: &str,
        context: &str,
    ) -> Result<ProviderOutput<Vec<String>>> {
        let api_key = self.api_key()?;
        let request = self.build_refine_request(prompt, context)?;
        let response = self.transport.send(&request, Auth::GoogleApiKey(api_key))?;
        let suggestions = parse_suggestions(&extract_text(&response));
        Ok(ProviderOutput::new(suggestions, &request))
    }
}

fn inline_part(asset: &ImageAsset) -> Value {
    json!({
        "inlineData": {
            "mimeType": asset.mime_type,
            "data": asset.data,
        }
    })
}

fn response_parts(response: &Value) -> impl Iterator<Item = &Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|candidate| candidate.pointer("/content/parts").and_then(Value::as_array))
        .flatten()
}

/// First inline image of a reply. A reply without one is reported with
/// the block reason Gemini gave, if any.
fn image_from_reply(response: &Value) -> Result<(Vec<u8>, String)> {
    if let Some((bytes, mime_type)) = extract_first_image(response)? {
        return Ok((bytes, mime_type.unwrap_or_else(|| "image/png".to_string())));
    }
    let block_reason = response
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
        .unwrap_or("none");
    debug!(block_reason, "gemini reply carried no image");
    Err(FacadeError::NoImageProduced {
        provider: PROVIDER.to_string(),
    })
}

fn extract_first_image(response: &Value) -> Result<Option<(Vec<u8>, Option<String>)>> {
    for part in response_parts(response) {
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let bytes = BASE64
            .decode(data.as_bytes())
            .map_err(|err| FacadeError::Decode(format!("gemini image base64: {err}")))?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(Some((bytes, mime_type)));
    }
    Ok(None)
}

fn extract_text(response: &Value) -> String {
    response_parts(response)
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}
