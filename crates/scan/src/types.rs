use std::fmt;
use std::io;
use std::path::Path;

use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// An image file as picked or captured by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl ImageBlob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    /// Read a file from disk, guessing the MIME type from its extension.
    pub async fn read(path: &Path) -> io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("receipt")
            .to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        Ok(Self::new(bytes, mime_for_extension(&ext), file_name))
    }

    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("byte_size", &self.bytes.len())
            .finish()
    }
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BudgetError {
    #[error("max_bytes must be greater than zero")]
    ZeroBytes,
    #[error("max_dimension must be greater than zero")]
    ZeroDimension,
}

/// Size limits a normalized image has to meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompressionBudget {
    max_bytes: u64,
    max_dimension: u32,
}

impl CompressionBudget {
    pub const DEFAULT_MAX_BYTES: u64 = 1024 * 1024;
    pub const DEFAULT_MAX_DIMENSION: u32 = 2048;

    pub fn new(max_bytes: u64, max_dimension: u32) -> Result<Self, BudgetError> {
        if max_bytes == 0 {
            return Err(BudgetError::ZeroBytes);
        }
        if max_dimension == 0 {
            return Err(BudgetError::ZeroDimension);
        }
        Ok(Self { max_bytes, max_dimension })
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }
}

impl Default for CompressionBudget {
    fn default() -> Self {
        Self {
            max_bytes: Self::DEFAULT_MAX_BYTES,
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
        }
    }
}

/// Lossy encoding quality in whole percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Quality(u8);

impl Quality {
    pub const START: Quality = Quality(90);
    pub const FLOOR: Quality = Quality(10);
    const STEP: u8 = 10;

    pub fn percent(self) -> u8 {
        self.0
    }

    pub fn as_f32(self) -> f32 {
        f32::from(self.0) / 100.0
    }

    /// The next quality in the search, or `None` at the floor.
    pub fn step_down(self) -> Option<Quality> {
        (self > Self::FLOOR).then(|| Quality(self.0.saturating_sub(Self::STEP).max(Self::FLOOR.0)))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.as_f32())
    }
}

/// Output of the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub blob: ImageBlob,
    /// Quality of the final encode; `None` when the input was passed through.
    pub quality: Option<Quality>,
    /// Pixel dimensions of the re-encoded image.
    pub dimensions: Option<(u32, u32)>,
}

impl NormalizedImage {
    pub fn passthrough(blob: ImageBlob) -> Self {
        Self { blob, quality: None, dimensions: None }
    }

    pub fn was_reencoded(&self) -> bool {
        self.quality.is_some()
    }
}

// ── Receipt data returned by the OCR endpoint ────────────────────────────────

/// One receipt line. Values are kept as the OCR service wrote them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "qty", default, deserialize_with = "lenient_string")]
    pub quantity: String,
    #[serde(rename = "price", default, deserialize_with = "lenient_string")]
    pub unit_price: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReceiptData {
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subtotal: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tax: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub service_charge: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total: String,
}

/// Accepts strings, numbers, booleans and null; null becomes `""`.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(D::Error::custom(format!("expected a string, found {other}"))),
    }
}

// ── Scan outcome ─────────────────────────────────────────────────────────────

/// Why a scan did not produce receipt data. The display text is meant to be
/// shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanFailure {
    #[error("configuration missing")]
    Configuration,
    #[error("could not read image: {0}")]
    Decode(String),
    #[error("could not compress image: {0}")]
    Encode(String),
    /// The endpoint answered with a non-2xx status.
    #[error("{code}: {body}")]
    Status { code: u16, body: String },
    /// The request never produced a response.
    #[error("{0}")]
    Transport(String),
    /// 2xx response whose body is not the expected shape.
    #[error("{0}")]
    Protocol(String),
    /// The service reported an error of its own.
    #[error("{0}")]
    Remote(String),
}

/// Outcome of one scan attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    Success(ReceiptData),
    Failure(ScanFailure),
}

impl ScanResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ScanResult::Success(_))
    }

    pub fn data(&self) -> Option<&ReceiptData> {
        match self {
            ScanResult::Success(data) => Some(data),
            ScanResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ScanFailure> {
        match self {
            ScanResult::Success(_) => None,
            ScanResult::Failure(failure) => Some(failure),
        }
    }

    /// Human-readable failure reason, `None` on success.
    pub fn reason(&self) -> Option<String> {
        self.failure().map(ToString::to_string)
    }
}

impl From<Result<ReceiptData, ScanFailure>> for ScanResult {
    fn from(result: Result<ReceiptData, ScanFailure>) -> Self {
        match result {
            Ok(data) => ScanResult::Success(data),
            Err(failure) => ScanResult::Failure(failure),
        }
    }
}

/// Serialized as `{ "success": true, "data": {...} }` or
/// `{ "success": false, "error": "..." }`.
impl Serialize for ScanResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ScanResult", 2)?;
        match self {
            ScanResult::Success(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            ScanResult::Failure(failure) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", &failure.to_string())?;
            }
        }
        state.end()
    }
}
