use std::path::Path;

use tracing::{info, warn};

use crate::compress::{normalize_async, CompressError};
use crate::config::{ConfigError, ScanConfig};
use crate::gateway::ScanGateway;
use crate::types::{CompressionBudget, ImageBlob, ScanFailure, ScanResult};

impl From<CompressError> for ScanFailure {
    fn from(e: CompressError) -> Self {
        match e {
            CompressError::Decode(msg) => ScanFailure::Decode(msg),
            CompressError::Encode(msg) | CompressError::Join(msg) => ScanFailure::Encode(msg),
        }
    }
}

/// Orchestrates: config check → normalize → submit.
#[derive(Debug, Clone)]
pub struct ScanPipeline {
    gateway: ScanGateway,
    config: ScanConfig,
    budget: CompressionBudget,
}

impl ScanPipeline {
    pub fn new(gateway: ScanGateway, config: ScanConfig) -> Result<Self, ConfigError> {
        let budget = config.budget()?;
        Ok(Self { gateway, config, budget })
    }

    /// Pipeline with an HTTP client built from `config`.
    pub fn from_config(config: ScanConfig) -> Result<Self, ConfigError> {
        let gateway = ScanGateway::from_config(&config)?;
        Self::new(gateway, config)
    }

    pub fn budget(&self) -> CompressionBudget {
        self.budget
    }

    /// Scan one receipt image. Never fails: every problem is reported as
    /// [`ScanResult::Failure`].
    pub async fn scan(&self, image: ImageBlob) -> ScanResult {
        if !self.config.is_complete() {
            warn!("OCR endpoint not configured, skipping compression");
            return ScanResult::Failure(ScanFailure::Configuration);
        }

        let original_size = image.byte_size();
        let normalized = match normalize_async(image, self.budget).await {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(error = %e, "could not prepare receipt image");
                return ScanResult::Failure(e.into());
            }
        };

        info!(
            from = original_size,
            to = normalized.blob.byte_size(),
            reencoded = normalized.was_reencoded(),
            "receipt image ready"
        );

        self.gateway.submit_with(&normalized.blob, &self.config).await
    }

    /// Process a file on disk.
    pub async fn scan_file(&self, path: &Path) -> ScanResult {
        match ImageBlob::read(path).await {
            Ok(image) => self.scan(image).await,
            Err(e) => ScanResult::Failure(ScanFailure::Decode(format!(
                "{}: {e}",
                path.display()
            ))),
        }
    }
}
