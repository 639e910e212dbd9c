use indexmap::IndexMap;

use crate::providers::ProviderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Text-to-image generation.
    Image,
    /// Image-to-image editing, with or without a mask.
    Edit,
    /// Text completion, used for prompt refinement.
    Text,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Edit => "edit",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: ProviderKind,
    pub capabilities: Vec<Capability>,
}

impl ModelSpec {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    /// Models serving `provider` with `capability`, in registration order.
    pub fn candidates(&self, provider: ProviderKind, capability: Capability) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.provider == provider && model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(
        &self,
        name: &str,
        provider: ProviderKind,
        capability: Capability,
    ) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.provider == provider && model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: ProviderKind, capabilities: &[Capability]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider,
                capabilities: capabilities.to_vec(),
            },
        );
    };

    insert(
        "gemini-2.5-flash-image",
        ProviderKind::Gemini,
        &[Capability::Image, Capability::Edit],
    );
    insert(
        "gemini-3-pro-image-preview",
        ProviderKind::Gemini,
        &[Capability::Image, Capability::Edit],
    );
    insert("gemini-2.5-flash", ProviderKind::Gemini, &[Capability::Text]);
    insert(
        "gpt-image-1",
        ProviderKind::OpenAi,
        &[Capability::Image, Capability::Edit],
    );
    insert(
        "gpt-image-1-mini",
        ProviderKind::OpenAi,
        &[Capability::Image, Capability::Edit],
    );
    insert("gpt-4.1-mini", ProviderKind::OpenAi, &[Capability::Text]);
    insert(
        "dryrun-image-1",
        ProviderKind::Dryrun,
        &[Capability::Image, Capability::Edit],
    );
    insert("dryrun-text-1", ProviderKind::Dryrun, &[Capability::Text]);

    map
}
