//! Privacy protocol — PII detection, detector merge, redaction.
//!
//! Detection sources implement [`PiiSource`]. The regex-based
//! [`PatternDetector`] is always present; an [`LlmDetector`] backed by an
//! external extraction service can be layered on top. [`PiiEngine`] merges
//! their findings and rewrites text with per-category placeholders.

pub mod engine;
pub mod extractor;
pub mod pii;

pub use engine::{apply_redactions, PiiEngine};
pub use extractor::{map_extraction_class, Extraction, ExtractionClient, HttpExtractionClient, LlmDetector};
pub use kbase_core::PiiCategory;
pub use pii::{Detection, DetectionResult, DetectionSource, PatternDetector, PiiSource};
