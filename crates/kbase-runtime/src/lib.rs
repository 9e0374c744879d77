//! Runtime: the ingestion pipeline that ties the kbase crates together.
//!
//! A document flows convert → identify → chunk → redact → embed → upsert as
//! one async unit. Services are passed in explicitly; nothing is global.

pub mod pipeline;
pub mod types;

pub use pipeline::{IngestionPipeline, UPSERT_BATCH_SIZE};
pub use types::*;
