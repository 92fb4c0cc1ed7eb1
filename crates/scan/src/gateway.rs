use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::{ConfigError, ScanConfig};
use crate::types::{ImageBlob, ReceiptData, ScanFailure, ScanResult};

/// Multipart field the OCR endpoint reads the image from.
const FILE_FIELD: &str = "file";
/// Sent when the blob's declared type is blank or unparseable.
const FALLBACK_MIME: &str = "application/octet-stream";

/// Forwards receipt images to the remote OCR endpoint.
///
/// Every call makes at most one request and always yields a [`ScanResult`];
/// no error escapes to the caller.
#[derive(Debug, Clone, Default)]
pub struct ScanGateway {
    client: reqwest::Client,
}

impl ScanGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Builds a client honouring `config.timeout_secs`.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?))
    }

    pub async fn submit_with(&self, image: &ImageBlob, config: &ScanConfig) -> ScanResult {
        self.submit(image, config.endpoint.as_deref(), config.token.as_deref())
            .await
    }

    pub async fn submit(
        &self,
        image: &ImageBlob,
        endpoint: Option<&str>,
        auth_token: Option<&str>,
    ) -> ScanResult {
        let endpoint = endpoint.filter(|e| !e.trim().is_empty());
        let auth_token = auth_token.filter(|t| !t.trim().is_empty());

        let (Some(endpoint), Some(auth_token)) = (endpoint, auth_token) else {
            warn!(
                endpoint_configured = endpoint.is_some(),
                token_configured = auth_token.is_some(),
                "OCR endpoint not configured"
            );
            return ScanResult::Failure(ScanFailure::Configuration);
        };

        let result = self.send(image, endpoint, auth_token).await;
        match &result {
            Ok(data) => info!(items = data.items.len(), total = %data.total, "receipt scanned"),
            Err(failure) => warn!(%failure, "receipt scan failed"),
        }
        result.into()
    }

    async fn send(
        &self,
        image: &ImageBlob,
        endpoint: &str,
        auth_token: &str,
    ) -> Result<ReceiptData, ScanFailure> {
        let form = Form::new().part(FILE_FIELD, file_part(image)?);

        info!(
            endpoint,
            file = %image.file_name,
            mime = %image.mime_type,
            size = image.byte_size(),
            "submitting receipt"
        );

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(auth_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ScanFailure::Transport(e.to_string()))?;

        let status = response.status();
        info!(status = status.as_u16(), "OCR endpoint responded");

        let body = response
            .text()
            .await
            .map_err(|e| ScanFailure::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ScanFailure::Status { code: status.as_u16(), body });
        }

        interpret_response(&body)
    }
}

/// The image as a multipart part. Unknown files often arrive with an empty
/// type, so an unusable one is replaced rather than blocking the upload.
fn file_part(image: &ImageBlob) -> Result<Part, ScanFailure> {
    let part = || Part::bytes(image.bytes.clone()).file_name(image.file_name.clone());

    let declared = image.mime_type.trim();
    if !declared.is_empty() {
        match part().mime_str(declared) {
            Ok(part) => return Ok(part),
            Err(e) => warn!(mime = declared, fallback = FALLBACK_MIME, error = %e, "unusable MIME type"),
        }
    }

    part()
        .mime_str(FALLBACK_MIME)
        .map_err(|e| ScanFailure::Encode(format!("could not build upload: {e}")))
}

/// Maps a 2xx response body onto receipt data or a failure.
pub fn interpret_response(body: &str) -> Result<ReceiptData, ScanFailure> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|e| ScanFailure::Protocol(format!("invalid JSON response: {e}")))?;
    let Value::Object(payload) = payload else {
        return Err(ScanFailure::Protocol("expected a JSON object response".to_string()));
    };

    match payload.get("data") {
        Some(data @ Value::Object(_)) if reports_success(&payload) => {
            serde_json::from_value(data.clone())
                .map_err(|e| ScanFailure::Protocol(format!("unexpected receipt data: {e}")))
        }
        _ => Err(ScanFailure::Remote(declared_error(&payload))),
    }
}

/// `"status": "success"`, `"success": true` or `"success": "true"`.
fn reports_success(payload: &Map<String, Value>) -> bool {
    let status_ok = payload
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("success"));
    let flag_ok = match payload.get("success") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };
    status_ok || flag_ok
}

fn declared_error(payload: &Map<String, Value>) -> String {
    ["error", "message", "detail"]
        .iter()
        .filter_map(|key| payload.get(*key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
        .unwrap_or("unknown error")
        .to_string()
}
