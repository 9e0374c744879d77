//! kbase Core — error type, pipeline configuration, shared enums.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ExtractionConfig, PipelineConfig};
pub use error::{Error, Result};
pub use types::PiiCategory;
