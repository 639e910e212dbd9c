use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use facade_contracts::errors::{FacadeError, Result};
use facade_contracts::providers::ProviderKind;
use tracing::debug;

use crate::retry::RetryPolicy;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 90;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub api_key: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub provider: ProviderKind,
    pub gemini: ProviderCredentials,
    pub openai: ProviderCredentials,
    pub image_model: Option<String>,
    pub text_model: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            gemini: ProviderCredentials {
                api_key: None,
                api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            },
            openai: ProviderCredentials {
                api_key: None,
                api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            },
            image_model: None,
            text_model: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Process environment first, then `FACADE_DOTENV` or `./.env`.
    pub fn from_env() -> Result<Self> {
        let dotenv_path = env::var("FACADE_DOTENV")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".env"));
        let dotenv = load_dotenv(&dotenv_path);
        Self::from_lookup(|key| {
            env::var(key)
                .ok()
                .or_else(|| dotenv.get(key).cloned())
        })
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(raw) = value("FACADE_PROVIDER") {
            config.provider = raw.parse().map_err(|err: String| {
                FacadeError::configuration(format!("FACADE_PROVIDER: {err}"))
            })?;
        }
        config.gemini.api_key = value("GEMINI_API_KEY").or_else(|| value("GOOGLE_API_KEY"));
        if let Some(base) = value("GEMINI_API_BASE") {
            config.gemini.api_base = base.trim_end_matches('/').to_string();
        }
        config.openai.api_key = value("OPENAI_API_KEY").or_else(|| value("OPENAI_API_KEY_BACKUP"));
        if let Some(base) = value("OPENAI_API_BASE") {
            config.openai.api_base = base.trim_end_matches('/').to_string();
        }
        config.image_model = value("FACADE_IMAGE_MODEL");
        config.text_model = value("FACADE_TEXT_MODEL");

        let number = |key: &str| parse_number(key, value(key));
        let timeout = number("FACADE_REQUEST_TIMEOUT")?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
            .clamp(15, 300);
        config.request_timeout = Duration::from_secs(timeout);

        if let Some(attempts) = number("FACADE_RETRY_ATTEMPTS")? {
            config.retry.attempts = attempts.clamp(1, 6) as u32;
        }
        if let Some(base_ms) = number("FACADE_RETRY_BASE_MS")? {
            config.retry.base_delay = Duration::from_millis(base_ms);
        }
        Ok(config)
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }
}

fn parse_number(key: &str, raw: Option<String>) -> Result<Option<u64>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.parse::<u64>()
        .map(Some)
        .map_err(|_| FacadeError::configuration(format!("{key} must be a number, got '{raw}'")))
}

fn load_dotenv(path: &Path) -> HashMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "loaded dotenv");
            parse_dotenv(&content)
        }
        Err(_) => HashMap::new(),
    }
}

pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for raw_line in content.lines() {
        let mut line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("export ") {
            line = stripped.trim();
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        let unquoted = [('"', '"'), ('\'', '\'')]
            .into_iter()
            .find_map(|(open, close)| {
                value
                    .strip_prefix(open)
                    .and_then(|rest| rest.strip_suffix(close))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), unquoted.to_string());
    }
    vars
}
