use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use facade_contracts::asset::{extension_for_mime, ImageAsset};
use facade_contracts::errors::{FacadeError, Result};
use facade_contracts::providers::ProviderKind;
use facade_contracts::styles::compose_create_prompt;
use serde_json::{json, Value};

use super::prompting::{parse_suggestions, refine_instruction, unmasked_edit_prompt};
use super::sizing::openai_size;
use super::{output_name, ImageProvider, ModelChoice};
use crate::config::ProviderCredentials;
use crate::intent::EditIntent;
use crate::mask::mask_for_base;
use crate::request::{FilePart, Operation, ProviderOutput, ProviderRequest, RequestBody};
use crate::transport::{Auth, HttpTransport};

const PROVIDER: &str = "openai";

/// REST variant: JSON for generation and text, multipart upload to the
/// in-painting endpoint for edits. Overlays have no form field here.
pub struct OpenAiProvider {
    credentials: ProviderCredentials,
    models: ModelChoice,
    transport: HttpTransport,
}

impl OpenAiProvider {
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
            FacadeError::configuration("OPENAI_API_KEY or OPENAI_API_KEY_BACKUP not configured")
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.credentials.api_base.trim_end_matches('/'))
    }

    fn send_for_image(&self, request: &ProviderRequest, prompt: &str) -> Result<ImageAsset> {
        let api_key = self.api_key()?;
        let response = self.transport.send(request, Auth::Bearer(api_key))?;
        let (bytes, mime_type) = match first_image_item(&response)? {
            Some(ImageItem::Inline(bytes)) => (bytes, None),
            Some(ImageItem::Url(url)) => self.transport.download(PROVIDER, &url)?,
            None => {
                return Err(FacadeError::NoImageProduced {
                    provider: PROVIDER.to_string(),
                })
            }
        };
        if bytes.is_empty() {
            return Err(FacadeError::NoImageProduced {
                provider: PROVIDER.to_string(),
            });
        }
        let mime_type = mime_type
            .filter(|mime| mime.starts_with("image/"))
            .unwrap_or_else(|| "image/png".to_string());
        Ok(ImageAsset::from_bytes(
            output_name(PROVIDER, prompt, &mime_type),
            mime_type,
            &bytes,
        ))
    }
}

impl ImageProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
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
        let size = openai_size(resolution, &mut warnings);
        Ok(ProviderRequest {
            provider: ProviderKind::OpenAi,
            operation: Operation::Create,
            endpoint: self.endpoint("images/generations"),
            model: self.models.image.clone(),
            body: RequestBody::Json(json!({
                "model": self.models.image,
                "prompt": compose_create_prompt(prompt, style),
                "size": size,
                "n": 1,
            })),
            warnings,
        })
    }

    fn build_edit_request(
        &self,
        base: &ImageAsset,
        intent: &EditIntent,
    ) -> Result<ProviderRequest> {
        if intent.overlay.is_some() {
            let feature = if intent.is_masked() {
                "overlay images combined with a mask"
            } else {
                "overlay images"
            };
            return Err(FacadeError::unsupported(PROVIDER, feature));
        }

        let mut files = vec![FilePart {
            field: "image".to_string(),
            file_name: format!("image.{}", extension_for_mime(&base.mime_type)),
            mime_type: base.mime_type.clone(),
            bytes: base.decode_bytes()?,
        }];
        let prompt = match intent.mask.as_ref() {
            Some(mask) => {
                let alpha = mask_for_base(mask, base)?.to_alpha_mask();
                let encoded = ImageAsset::from_rgba("mask.png", &alpha)?;
                files.push(FilePart {
                    field: "mask".to_string(),
                    file_name: "mask.png".to_string(),
                    mime_type: "image/png".to_string(),
                    bytes: encoded.decode_bytes()?,
                });
                intent.prompt_text.clone()
            }
            None => unmasked_edit_prompt(intent),
        };

        Ok(ProviderRequest {
            provider: ProviderKind::OpenAi,
            operation: Operation::Edit,
            endpoint: self.endpoint("images/edits"),
            model: self.models.image.clone(),
            body: RequestBody::Multipart {
                fields: vec![
                    ("model".to_string(), self.models.image.clone()),
                    ("prompt".to_string(), prompt),
                    ("n".to_string(), "1".to_string()),
                ],
                files,
            },
            warnings: Vec::new(),
        })
    }

    fn build_refine_request(&self, prompt: &str, context: &str) -> Result<ProviderRequest> {
        if prompt.trim().is_empty() {
            return Err(FacadeError::input("text to refine is required"));
        }
        Ok(ProviderRequest {
            provider: ProviderKind::OpenAi,
            operation: Operation::Refine,
            endpoint: self.endpoint("responses"),
            model: self.models.text.clone(),
            body: RequestBody::Json(json!({
                "model": self.models.text,
                "input": refine_instruction(prompt, context),
                "text": { "format": { "type": "json_object" } },
            })),
            warnings: Vec::new(),
        })
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
        let response = self.transport.send(&request, Auth::Bearer(api_key))?;
        let suggestions = parse_suggestions(&extract_output_text(&response));
        Ok(ProviderOutput::new(suggestions, &request))
    }
}

#[derive(Debug, PartialEq)]
enum ImageItem {
    Inline(Vec<u8>),
    Url(String),
}

fn first_image_item(response: &Value) -> Result<Option<ImageItem>> {
    let rows = response.get("data").and_then(Value::as_array);
    for row in rows.into_iter().flatten() {
        if let Some(b64) = row.get("b64_json").and_then(Value::as_str) {
            let bytes = BASE64
                .decode(b64.as_bytes())
                .map_err(|err| FacadeError::Decode(format!("openai image base64: {err}")))?;
            return Ok(Some(ImageItem::Inline(bytes)));
        }
        if let Some(url) = row.get("url").and_then(Value::as_str) {
            return Ok(Some(ImageItem::Url(url.to_string())));
        }
    }
    Ok(None)
}

fn extract_output_text(response: &Value) -> String {
    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return text.trim().to_string();
        }
    }

    let mut parts: Vec<&str> = Vec::new();
    let rows = response.get("output").and_then(Value::as_array);
    for row in rows.into_iter().flatten() {
        match row.get("type").and_then(Value::as_str) {
            Some("output_text" | "text") => {
                if let Some(text) = row.get("text").and_then(Value::as_str) {
                    parts.push(text);
                }
                continue;
            }
            Some("message") | None => {}
            Some(_) => continue,
        }
        let content = row.get("content").and_then(Value::as_array);
        for chunk in content.into_iter().flatten() {
            let kind = chunk.get("type").and_then(Value::as_str).unwrap_or("output_text");
            if !matches!(kind, "output_text" | "text") {
                continue;
            }
            if let Some(text) = chunk.get("text").and_then(Value::as_str) {
                parts.push(text);
            }
        }
    }
    parts
        .into_iter()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
