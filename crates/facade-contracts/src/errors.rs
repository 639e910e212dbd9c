//! Error taxonomy shared by every facade crate.
//!
//! Pre-flight errors (configuration, unsupported feature, input
//! validation, access, busy) are raised before any network I/O and are
//! never retried. Of the rest, only what the provider or the network
//! produced (rejection, missing image, transport) is retryable.

pub type Result<T> = std::result::Result<T, FacadeError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FacadeError {
    /// Credentials or settings missing locally. Never reached the provider.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{provider} does not support {feature}")]
    UnsupportedFeature { provider: String, feature: String },

    #[error("{provider} request failed{}: {message}", status_suffix(.status))]
    ProviderRejection {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{provider} returned no image; the request was possibly policy-blocked")]
    NoImageProduced { provider: String },

    #[error("{provider} transport error: {message}")]
    Transport { provider: String, message: String },

    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("another operation is already in flight")]
    Busy,

    #[error("failed to read file: {0}")]
    FileRead(String),

    #[error("image decode failed: {0}")]
    Decode(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" ({code})")).unwrap_or_default()
}

impl FacadeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn unsupported(provider: &str, feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            provider: provider.to_string(),
            feature: feature.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::InputValidation(message.into())
    }

    pub fn transport(provider: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn rejection(provider: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ProviderRejection {
            provider: provider.to_string(),
            status,
            message: message.into(),
        }
    }

    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::UnsupportedFeature { .. }
                | Self::InputValidation(_)
                | Self::AccessDenied(_)
                | Self::Busy
        )
    }

    /// Remote-call failures are retried identically; local ones are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderRejection { .. } | Self::NoImageProduced { .. } | Self::Transport { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::UnsupportedFeature { .. } => "unsupported_feature",
            Self::ProviderRejection { .. } => "provider_rejection",
            Self::NoImageProduced { .. } => "no_image_produced",
            Self::Transport { .. } => "transport",
            Self::InputValidation(_) => "input_validation",
            Self::AccessDenied(_) => "access_denied",
            Self::Busy => "busy",
            Self::FileRead(_) => "file_read",
            Self::Decode(_) => "decode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FacadeError;

    #[test]
    fn preflight_errors_are_never_retryable() {
        let errors = [
            FacadeError::configuration("GEMINI_API_KEY not configured"),
            FacadeError::unsupported("openai", "overlay images"),
            FacadeError::input("prompt is required"),
            FacadeError::AccessDenied("not approved".to_string()),
            FacadeError::Busy,
        ];
        for err in errors {
            assert!(err.is_preflight(), "{err}");
            assert!(!err.is_retryable(), "{err}");
        }
    }

    #[test]
    fn remote_errors_are_retryable() {
        assert!(FacadeError::transport("gemini", "connection reset").is_retryable());
        assert!(FacadeError::rejection("openai", Some(500), "boom").is_retryable());
        assert!(FacadeError::NoImageProduced {
            provider: "gemini".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn messages_distinguish_missing_credentials_from_rejection() {
        let missing = FacadeError::configuration("OPENAI_API_KEY not configured").to_string();
        let rejected =
            FacadeError::rejection("openai", Some(401), "rejected by provider: bad key")
                .to_string();
        assert!(missing.starts_with("configuration error"));
        assert_eq!(
            rejected,
            "openai request failed (401): rejected by provider: bad key"
        );
    }

    #[test]
    fn no_image_message_mentions_policy_block() {
        let err = FacadeError::NoImageProduced {
            provider: "gemini".to_string(),
        };
        assert!(err.to_string().contains("possibly policy-blocked"));
        assert_eq!(err.kind(), "no_image_produced");
    }
}
