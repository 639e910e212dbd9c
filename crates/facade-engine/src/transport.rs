use std::time::Duration;

use facade_contracts::errors::{FacadeError, Result};
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

use crate::request::{ProviderRequest, RequestBody};

const ERROR_BODY_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    Bearer(&'a str),
    GoogleApiKey(&'a str),
}

/// Blocking HTTP executor shared by the remote providers.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FacadeError::configuration(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { http })
    }

    pub fn send(&self, request: &ProviderRequest, auth: Auth<'_>) -> Result<Value> {
        let provider = request.provider.name();
        let mut builder = self.http.post(&request.endpoint);
        builder = match auth {
            Auth::Bearer(key) => builder.bearer_auth(key),
            Auth::GoogleApiKey(key) => builder.header("x-goog-api-key", key),
        };
        builder = match &request.body {
            RequestBody::Json(payload) => builder.json(payload),
            RequestBody::Multipart { fields, files } => {
                let mut form = MultipartForm::new();
                for (key, value) in fields {
                    form = form.text(key.clone(), value.clone());
                }
                for file in files {
                    let part = MultipartPart::bytes(file.bytes.clone())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.mime_type)
                        .map_err(|err| {
                            FacadeError::input(format!(
                                "invalid mime '{}' for {}: {err}",
                                file.mime_type, file.file_name
                            ))
                        })?;
                    form = form.part(file.field.clone(), part);
                }
                builder.multipart(form)
            }
        };

        debug!(provider, endpoint = %request.endpoint, "sending provider request");
        let response = builder
            .send()
            .map_err(|err| FacadeError::transport(provider, error_chain_text(&err)))?;
        response_json_or_error(provider, response)
    }

    /// Fetches image bytes a provider returned by URL.
    pub fn download(&self, provider: &str, url: &str) -> Result<(Vec<u8>, Option<String>)> {
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|err| FacadeError::transport(provider, error_chain_text(&err)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FacadeError::rejection(
                provider,
                Some(status.as_u16()),
                format!(
                    "image download failed: {}",
                    truncate_text(&body, ERROR_BODY_MAX_CHARS)
                ),
            ));
        }
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .map_err(|err| FacadeError::transport(provider, error_chain_text(&err)))?
            .to_vec();
        Ok((bytes, mime_type))
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(|err| FacadeError::transport(provider, format!("response body read failed: {err}")))?;
    if !status.is_success() {
        let detail = truncate_text(&body, ERROR_BODY_MAX_CHARS);
        let message = if matches!(code, 401 | 403) {
            format!("rejected by provider: {detail}")
        } else {
            detail
        };
        return Err(FacadeError::rejection(provider, Some(code), message));
    }
    serde_json::from_str(&body).map_err(|_| {
        FacadeError::rejection(provider, Some(code), "returned invalid JSON payload")
    })
}

fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(cause) = current {
        let text = cause.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty() && parts.last().map(|last| last != trimmed).unwrap_or(true) {
            parts.push(trimmed.to_string());
        }
        current = cause.source();
    }
    truncate_text(&parts.join(" | caused by: "), ERROR_BODY_MAX_CHARS)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::{error_chain_text, truncate_text};

    #[derive(Debug)]
    struct Layer {
        message: &'static str,
        source: Option<Box<Layer>>,
    }

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message)
        }
    }

    impl std::error::Error for Layer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.source
                .as_deref()
                .map(|layer| layer as &(dyn std::error::Error + 'static))
        }
    }

    #[test]
    fn error_chain_joins_distinct_causes() {
        let err = Layer {
            message: "error sending request",
            source: Some(Box::new(Layer {
                message: "connection refused",
                source: Some(Box::new(Layer {
                    message: "connection refused",
                    source: None,
                })),
            })),
        };
        assert_eq!(
            error_chain_text(&err),
            "error sending request | caused by: connection refused"
        );
    }

    #[test]
    fn truncate_appends_ellipsis() {
        assert_eq!(truncate_text("abcdef", 3), "abc…");
        assert_eq!(truncate_text("abc", 3), "abc");
    }
}
