use super::registry::{Capability, ModelRegistry, ModelSpec};
use crate::providers::ProviderKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_default(),
        }
    }

    pub fn select(
        &self,
        provider: ProviderKind,
        requested: Option<&str>,
        capability: Capability,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let fallback_reason = if let Some(requested_value) = requested {
            if let Some(model) = self.registry.ensure(requested_value, provider, capability) {
                return Ok(ModelSelection {
                    model,
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            // Unknown names are passed through so new provider models work
            // without a registry update.
            if self.registry.get(requested_value).is_none() {
                return Ok(ModelSelection {
                    model: ModelSpec {
                        name: requested_value.to_string(),
                        provider,
                        capabilities: vec![capability],
                    },
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            Some(format!(
                "Requested model '{requested_value}' unavailable for {} capability '{}'.",
                provider.name(),
                capability.as_str()
            ))
        } else {
            None
        };

        let candidates = self.registry.candidates(provider, capability);
        let Some(model) = candidates.first().cloned() else {
            return Err(format!(
                "No {} models available for capability '{}'.",
                provider.name(),
                capability.as_str()
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason,
        })
    }
}
