pub mod compress;
pub mod config;
pub mod gateway;
pub mod pipeline;
pub mod receipt;
pub mod types;

pub use compress::{normalize, normalize_async, normalize_with, target_dimensions, CompressError, JpegEncoder, LossyEncoder};
pub use config::{ConfigError, ScanConfig};
pub use gateway::{interpret_response, ScanGateway};
pub use pipeline::ScanPipeline;
pub use receipt::{parse_amount, parse_quantity};
pub use types::{
    BudgetError, CompressionBudget, ImageBlob, LineItem, NormalizedImage, Quality, ReceiptData,
    ScanFailure, ScanResult,
};
