use facade_contracts::providers::ProviderKind;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Edit,
    Refine,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Refine => "refine",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<FilePart>,
    },
}

/// A fully built provider call, ready for the transport. Building never
/// touches the network, so unsupported combinations fail here.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub provider: ProviderKind,
    pub operation: Operation,
    pub endpoint: String,
    pub model: String,
    pub body: RequestBody,
    pub warnings: Vec<String>,
}

impl ProviderRequest {
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            RequestBody::Multipart { .. } => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Multipart { fields, .. } => fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            RequestBody::Json(_) => None,
        }
    }

    pub fn file(&self, field: &str) -> Option<&FilePart> {
        match &self.body {
            RequestBody::Multipart { files, .. } => files.iter().find(|file| file.field == field),
            RequestBody::Json(_) => None,
        }
    }

    /// Loggable description of the request with image bytes elided.
    pub fn manifest(&self) -> Map<String, Value> {
        let payload = match &self.body {
            RequestBody::Json(value) => redact_inline_data(value),
            RequestBody::Multipart { fields, files } => {
                let mut form = Map::new();
                for (key, value) in fields {
                    form.insert(key.clone(), Value::String(value.clone()));
                }
                form.insert(
                    "files".to_string(),
                    Value::Array(
                        files
                            .iter()
                            .map(|file| {
                                json!({
                                    "field": file.field,
                                    "file_name": file.file_name,
                                    "mime_type": file.mime_type,
                                    "bytes": file.bytes.len(),
                                })
                            })
                            .collect(),
                    ),
                );
                Value::Object(form)
            }
        };
        let mut manifest = Map::new();
        manifest.insert(
            "provider".to_string(),
            Value::String(self.provider.name().to_string()),
        );
        manifest.insert(
            "operation".to_string(),
            Value::String(self.operation.as_str().to_string()),
        );
        manifest.insert("endpoint".to_string(), Value::String(self.endpoint.clone()));
        manifest.insert("model".to_string(), Value::String(self.model.clone()));
        manifest.insert("payload".to_string(), payload);
        if !self.warnings.is_empty() {
            manifest.insert("warnings".to_string(), json!(self.warnings));
        }
        manifest
    }
}

/// Result of a provider operation plus the request that produced it.
#[derive(Debug, Clone)]
pub struct ProviderOutput<T> {
    pub value: T,
    pub request: Map<String, Value>,
    pub warnings: Vec<String>,
}

impl<T> ProviderOutput<T> {
    pub fn new(value: T, request: &ProviderRequest) -> Self {
        Self {
            value,
            request: request.manifest(),
            warnings: request.warnings.clone(),
        }
    }
}

fn redact_inline_data(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut out = Map::new();
            for (key, item) in object {
                let is_inline = key == "inlineData" || key == "inline_data";
                let redacted = match (is_inline, item) {
                    (true, Value::Object(inline)) => {
                        let mut inline = inline.clone();
                        if let Some(Value::String(data)) = inline.get("data") {
                            let summary = format!("<{} base64 chars>", data.len());
                            inline.insert("data".to_string(), Value::String(summary));
                        }
                        Value::Object(inline)
                    }
                    _ => redact_inline_data(item),
                };
                out.insert(key.clone(), redacted);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_inline_data).collect()),
        other => other.clone(),
    }
}
