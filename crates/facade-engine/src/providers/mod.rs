mod dryrun;
mod gemini;
mod openai;
pub mod prompting;
mod sizing;

use facade_contracts::asset::ImageAsset;
use facade_contracts::errors::Result;
use facade_contracts::models::{Capability, ModelSelector};
use facade_contracts::providers::ProviderKind;
use tracing::warn;

use crate::config::EngineConfig;
use crate::intent::EditIntent;
use crate::request::{ProviderOutput, ProviderRequest};
use crate::transport::HttpTransport;

pub use dryrun::DryrunProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// The three-operation contract every backend satisfies. Builders never
/// touch the network; the operations check credentials, build, then send.
pub trait ImageProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn name(&self) -> &str {
        self.kind().name()
    }

    fn build_create_request(
        &self,
        prompt: &str,
        style: &str,
        resolution: &str,
    ) -> Result<ProviderRequest>;

    fn build_edit_request(&self, base: &ImageAsset, intent: &EditIntent)
        -> Result<ProviderRequest>;

    fn build_refine_request(&self, prompt: &str, context: &str) -> Result<ProviderRequest>;

    fn generate_image_from_text(
        &self,
        prompt: &str,
        style: &str,
        resolution: &str,
    ) -> Result<ProviderOutput<ImageAsset>>;

    fn edit_image(
        &self,
        base: &ImageAsset,
        intent: &EditIntent,
    ) -> Result<ProviderOutput<ImageAsset>>;

    fn refine_text_prompt(&self, prompt: &str, context: &str)
        -> Result<ProviderOutput<Vec<String>>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub image: String,
    pub text: String,
}

pub fn resolve_models(config: &EngineConfig) -> Result<ModelChoice> {
    let selector = ModelSelector::default();
    let pick = |requested: Option<&str>, capability: Capability| -> Result<String> {
        let selection = selector
            .select(config.provider, requested, capability)
            .map_err(facade_contracts::errors::FacadeError::configuration)?;
        if let Some(reason) = selection.fallback_reason.as_deref() {
            warn!(provider = %config.provider, reason, "model fallback");
        }
        Ok(selection.model.name)
    };
    Ok(ModelChoice {
        image: pick(config.image_model.as_deref(), Capability::Edit)?,
        text: pick(config.text_model.as_deref(), Capability::Text)?,
    })
}

/// Builds the single provider client for this process from configuration.
pub fn build_provider(config: &EngineConfig) -> Result<Box<dyn ImageProvider>> {
    let models = resolve_models(config)?;
    let provider: Box<dyn ImageProvider> = match config.provider {
        ProviderKind::Gemini => Box::new(GeminiProvider::new(
            config.gemini.clone(),
            models,
            HttpTransport::new(config.request_timeout)?,
        )),
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(
            config.openai.clone(),
            models,
            HttpTransport::new(config.request_timeout)?,
        )),
        ProviderKind::Dryrun => Box::new(DryrunProvider::new(models)),
    };
    Ok(provider)
}

pub(crate) fn output_name(prefix: &str, prompt: &str, mime_type: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|duration| duration.as_nanos())
            .unwrap_or(0)
            .to_be_bytes(),
    );
    let digest = hasher.finalize();
    format!(
        "{prefix}-{}.{}",
        hex::encode(&digest[..4]),
        facade_contracts::asset::extension_for_mime(mime_type)
    )
}

#[cfg(test)]
mod tests {
    use facade_contracts::providers::ProviderKind;

    use super::{build_provider, output_name, resolve_models};
    use crate::config::EngineConfig;

    #[test]
    fn provider_is_selected_by_config_flag() -> anyhow::Result<()> {
        for kind in ProviderKind::ALL {
            let mut config = EngineConfig::default();
            config.provider = kind;
            let provider = build_provider(&config)?;
            assert_eq!(provider.kind(), kind);
            assert_eq!(provider.name(), kind.name());
        }
        Ok(())
    }

    #[test]
    fn models_default_per_provider_and_honor_overrides() -> anyhow::Result<()> {
        let mut config = EngineConfig::default();
        config.provider = ProviderKind::OpenAi;
        let models = resolve_models(&config)?;
        assert_eq!(models.image, "gpt-image-1");
        assert_eq!(models.text, "gpt-4.1-mini");

        config.image_model = Some("gpt-image-1-mini".to_string());
        assert_eq!(resolve_models(&config)?.image, "gpt-image-1-mini");
        Ok(())
    }

    #[test]
    fn output_names_carry_extension() {
        let name = output_name("render", "pavilion", "image/jpeg");
        assert!(name.starts_with("render-"));
        assert!(name.ends_with(".jpg"));
    }
}
