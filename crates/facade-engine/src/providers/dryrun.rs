use facade_contracts::asset::ImageAsset;
use facade_contracts::errors::{FacadeError, Result};
use facade_contracts::providers::ProviderKind;
use facade_contracts::styles::compose_create_prompt;
use image::{Rgba, RgbaImage};
use serde_json::json;
use sha2::{Digest, Sha256};

use super::prompting::{unmasked_edit_prompt, MAX_SUGGESTIONS};
use super::sizing::pixel_size;
use super::{output_name, ImageProvider, ModelChoice};
use crate::intent::EditIntent;
use crate::mask::mask_for_base;
use crate::request::{Operation, ProviderOutput, ProviderRequest, RequestBody};

/// Offline provider. Renders deterministic images locally so the whole
/// pipeline can run without credentials.
pub struct DryrunProvider {
    models: ModelChoice,
}

impl DryrunProvider {
    pub fn new(models: ModelChoice) -> Self {
        Self { models }
    }

    fn request(
        &self,
        operation: Operation,
        model: &str,
        payload: serde_json::Value,
        warnings: Vec<String>,
    ) -> ProviderRequest {
        ProviderRequest {
            provider: ProviderKind::Dryrun,
            operation,
            endpoint: format!("dryrun://{}", operation.as_str()),
            model: model.to_string(),
            body: RequestBody::Json(payload),
            warnings,
        }
    }
}

impl ImageProvider for DryrunProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Dryrun
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
        let (width, height) = pixel_size(resolution)?;
        Ok(self.request(
            Operation::Create,
            &self.models.image,
            json!({
                "prompt": compose_create_prompt(prompt, style),
                "resolution": resolution,
                "width": width,
                "height": height,
            }),
            Vec::new(),
        ))
    }

    fn build_edit_request(
        &self,
        base: &ImageAsset,
        intent: &EditIntent,
    ) -> Result<ProviderRequest> {
        let mask_pixels = match intent.mask.as_ref() {
            Some(mask) => Some(mask_for_base(mask, base)?.editable_pixels()),
            None => None,
        };
        Ok(self.request(
            Operation::Edit,
            &self.models.image,
            json!({
                "prompt": unmasked_edit_prompt(intent),
                "intensity": intent.intensity,
                "base": { "name": base.name, "mime_type": base.mime_type, "bytes": base.byte_len() },
                "overlay": intent.overlay.as_ref().map(|overlay| overlay.name.clone()),
                "mask_editable_pixels": mask_pixels,
            }),
            Vec::new(),
        ))
    }

    fn build_refine_request(&self, prompt: &str, context: &str) -> Result<ProviderRequest> {
        if prompt.trim().is_empty() {
            return Err(FacadeError::input("text to refine is required"));
        }
        Ok(self.request(
            Operation::Refine,
            &self.models.text,
            json!({ "prompt": prompt.trim(), "context": context.trim() }),
            Vec::new(),
        ))
    }

    fn generate_image_from_text(
        &self,
        prompt: &str,
        style: &str,
        resolution: &str,
    ) -> Result<ProviderOutput<ImageAsset>> {
        let request = self.build_create_request(prompt, style, resolution)?;
        let (width, height) = pixel_size(resolution)?;
        let (r, g, b) = color_from_prompt(prompt);
        let pixels = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));
        let name = output_name("dryrun", prompt, "image/png");
        Ok(ProviderOutput::new(ImageAsset::from_rgba(name, &pixels)?, &request))
    }

    fn edit_image(
        &self,
        base: &ImageAsset,
        intent: &EditIntent,
    ) -> Result<ProviderOutput<ImageAsset>> {
        let request = self.build_edit_request(base, intent)?;
        let mut pixels = base.decode_rgba()?;
        let mask = match intent.mask.as_ref() {
            Some(mask) => Some(mask_for_base(mask, base)?),
            None => None,
        };
        let (r, g, b) = color_from_prompt(&intent.prompt_text);
        let weight = f32::from(intent.intensity) / 100.0;
        for (x, y, pixel) in pixels.enumerate_pixels_mut() {
            if mask.as_ref().is_some_and(|mask| !mask.is_editable(x, y)) {
                continue;
            }
            let blend = |from: u8, to: u8| -> u8 {
                (f32::from(from) * (1.0 - weight) + f32::from(to) * weight).round() as u8
            };
            *pixel = Rgba([blend(pixel[0], r), blend(pixel[1], g), blend(pixel[2], b), pixel[3]]);
        }
        let name = output_name("dryrun-edit", &intent.prompt_text, "image/png");
        Ok(ProviderOutput::new(ImageAsset::from_rgba(name, &pixels)?, &request))
    }

    fn refine_text_prompt(
        &self,
        prompt: &str,
        context: &str,
    ) -> Result<ProviderOutput<Vec<String>>> {
        let request = self.build_refine_request(prompt, context)?;
        let prompt = prompt.trim().trim_end_matches('.');
        let context = context.trim();
        let mood = if context.is_empty() {
            String::new()
        } else {
            format!(" in a {context} mood")
        };
        let suggestions: Vec<String> = [
            format!("{prompt}, rendered with crisp architectural detail{mood}"),
            format!("{prompt}, with honest natural materials under soft daylight"),
            format!("{prompt}, seen from eye level with true vertical perspective"),
        ]
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .collect();
        Ok(ProviderOutput::new(suggestions, &request))
    }
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.trim().as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
