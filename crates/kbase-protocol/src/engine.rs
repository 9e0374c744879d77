//! PII engine: merges detector output and redacts content.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use kbase_core::{PiiCategory, PipelineConfig, Result};

use crate::extractor::{HttpExtractionClient, LlmDetector};
use crate::pii::{Detection, DetectionResult, PatternDetector, PiiSource};

/// Combines an optional primary detector with the pattern detector.
///
/// Primary detections come first. Pattern detections are appended unless a
/// detection with the exact same span is already present. A failing primary
/// degrades to pattern-only results.
pub struct PiiEngine {
    enabled: bool,
    primary: Option<Arc<dyn PiiSource>>,
    patterns: PatternDetector,
}

impl PiiEngine {
    /// Pattern-only engine.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            primary: None,
            patterns: PatternDetector::new(),
        }
    }

    pub fn with_primary(mut self, source: Arc<dyn PiiSource>) -> Self {
        self.primary = Some(source);
        self
    }

    /// Build from pipeline configuration. The HTTP extractor is attached only
    /// when an extraction endpoint is configured.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mut engine = Self::new(config.pii_detection_enabled);
        if let Some(extraction) = &config.extraction {
            let client = HttpExtractionClient::new(extraction)?;
            debug!("LLM PII extraction enabled via {}", extraction.endpoint);
            engine = engine.with_primary(Arc::new(LlmDetector::new(client)));
        }
        Ok(engine)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Detect PII of the given categories. An empty slice means all categories.
    pub async fn detect(&self, content: &str, categories: &[PiiCategory]) -> DetectionResult {
        if !self.enabled {
            return DetectionResult::empty();
        }

        let categories: &[PiiCategory] = if categories.is_empty() {
            &PiiCategory::ALL
        } else {
            categories
        };

        let mut detections: Vec<Detection> = Vec::new();
        if let Some(primary) = &self.primary {
            match primary.detect(content, categories).await {
                Ok(found) => detections = found,
                Err(e) => warn!(
                    "PII source '{}' failed, using pattern detection only: {}",
                    primary.name(),
                    e
                ),
            }
        }

        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        detections.retain(|d| seen.insert((d.start, d.end)));
        for detection in self.patterns.scan(content, categories) {
            if seen.insert((detection.start, detection.end)) {
                detections.push(detection);
            }
        }

        let mut categories_found: Vec<PiiCategory> = Vec::new();
        for d in &detections {
            if !categories_found.contains(&d.category) {
                categories_found.push(d.category);
            }
        }

        DetectionResult {
            has_pii: !detections.is_empty(),
            categories_found,
            detections,
            redacted_content: None,
        }
    }

    /// Detect then replace every detection with its category placeholder.
    pub async fn redact(
        &self,
        content: &str,
        categories: &[PiiCategory],
    ) -> (String, DetectionResult) {
        let mut result = self.detect(content, categories).await;
        if !result.has_pii {
            result.redacted_content = Some(content.to_string());
            return (content.to_string(), result);
        }
        let redacted = apply_redactions(content, &result.detections);
        debug!(
            "Redacted {} PII span(s) in {:?}",
            result.detections.len(),
            result.categories_found
        );
        result.redacted_content = Some(redacted.clone());
        (redacted, result)
    }
}

/// Replace detected spans with placeholders, applying edits from the highest
/// start offset down so earlier offsets stay valid.
///
/// Overlapping spans are applied as-is, which may garble text around them,
/// but offsets are clamped and snapped to char boundaries so this never panics.
pub fn apply_redactions(content: &str, detections: &[Detection]) -> String {
    let mut ordered: Vec<&Detection> = detections.iter().collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start));

    let mut out = content.to_string();
    for d in ordered {
        let end = ceil_char_boundary(&out, d.end.min(out.len()));
        let start = floor_char_boundary(&out, d.start.min(end));
        if start >= end {
            continue;
        }
        out.replace_range(start..end, d.category.placeholder());
    }
    out
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pii::DetectionSource;
    use async_trait::async_trait;
    use kbase_core::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSource {
        found: Vec<Detection>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn returning(found: Vec<Detection>) -> Arc<Self> {
            Arc::new(Self { found, fail: false, calls: AtomicUsize::new(0) })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { found: vec![], fail: true, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl PiiSource for StubSource {
        async fn detect(&self, _text: &str, _categories: &[PiiCategory]) -> Result<Vec<Detection>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Extraction("service unavailable".into()));
            }
            Ok(self.found.clone())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn llm(category: PiiCategory, text: &str, content: &str) -> Detection {
        let start = content.find(text).unwrap();
        Detection {
            category,
            text: text.to_string(),
            start,
            end: start + text.len(),
            confidence: 0.9,
            source: DetectionSource::Llm,
        }
    }

    const SAMPLE: &str = "My password is secret123 and my email is john@example.com";

    #[tokio::test]
    async fn test_redact_password_and_email() {
        let engine = PiiEngine::new(true);
        let (redacted, result) = engine
            .redact(SAMPLE, &[PiiCategory::Password, PiiCategory::Email])
            .await;

        assert_eq!(
            redacted,
            "My password is [REDACTED_PASSWORD] and my email is [REDACTED_EMAIL]"
        );
        assert!(result.has_pii);
        assert_eq!(
            result.categories_found,
            vec![PiiCategory::Password, PiiCategory::Email]
        );
        assert_eq!(result.detections.len(), 2);
    }

    #[tokio::test]
    async fn test_redacted_content_recorded() {
        let engine = PiiEngine::new(true);
        let (redacted, result) = engine.redact("DB_PASSWORD=hunter2", &[]).await;
        assert_eq!(redacted, "DB_PASSWORD=[REDACTED_PASSWORD]");
        assert_eq!(result.redacted_content.as_deref(), Some(redacted.as_str()));

        let (_, clean) = engine.redact("nothing here", &[]).await;
        assert_eq!(clean.redacted_content.as_deref(), Some("nothing here"));

        let detected = engine.detect("DB_PASSWORD=hunter2", &[]).await;
        assert!(detected.redacted_content.is_none());
    }

    #[tokio::test]
    async fn test_disabled_engine_is_inert() {
        let stub = StubSource::returning(vec![llm(PiiCategory::Email, "john@example.com", SAMPLE)]);
        let engine = PiiEngine::new(false).with_primary(stub.clone());

        let (redacted, result) = engine.redact(SAMPLE, &PiiCategory::ALL).await;
        assert_eq!(redacted, SAMPLE);
        assert!(!result.has_pii);
        assert!(result.detections.is_empty());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clean_text_unchanged() {
        let engine = PiiEngine::new(true);
        let text = "The quarterly report is attached.";
        let (redacted, result) = engine.redact(text, &[]).await;
        assert_eq!(redacted, text);
        assert!(!result.has_pii);
        assert!(result.categories_found.is_empty());
    }

    #[tokio::test]
    async fn test_empty_categories_means_all() {
        let engine = PiiEngine::new(true);
        let result = engine.detect("SSN 123-45-6789", &[]).await;
        assert!(result.categories_found.contains(&PiiCategory::Ssn));
    }

    #[tokio::test]
    async fn test_primary_wins_exact_span() {
        let stub = StubSource::returning(vec![llm(PiiCategory::Email, "john@example.com", SAMPLE)]);
        let engine = PiiEngine::new(true).with_primary(stub.clone());

        let result = engine.detect(SAMPLE, &[PiiCategory::Email]).await;
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.detections[0].source, DetectionSource::Llm);
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back_to_patterns() {
        let engine = PiiEngine::new(true).with_primary(StubSource::failing());

        let (redacted, result) = engine
            .redact(SAMPLE, &[PiiCategory::Password, PiiCategory::Email])
            .await;
        assert_eq!(result.detections.len(), 2);
        assert!(result
            .detections
            .iter()
            .all(|d| d.source == DetectionSource::Pattern));
        assert!(redacted.ends_with("[REDACTED_EMAIL]"));
    }

    #[tokio::test]
    async fn test_overlapping_spans_kept_without_panic() {
        // Partial email from the primary overlaps the full pattern match.
        let stub = StubSource::returning(vec![llm(PiiCategory::Email, "john@example", SAMPLE)]);
        let engine = PiiEngine::new(true).with_primary(stub);

        let (redacted, result) = engine.redact(SAMPLE, &[PiiCategory::Email]).await;
        assert_eq!(result.detections.len(), 2);
        assert!(redacted.starts_with("My password is secret123"));
        assert!(redacted.contains("[REDACTED_EMAIL]"));
        assert!(!redacted.contains("john@example.com"));
    }

    #[tokio::test]
    async fn test_pattern_duplicates_collapse() {
        let engine = PiiEngine::new(true);
        let result = engine.detect("Call 555-123-4567 now", &[PiiCategory::Phone]).await;
        assert_eq!(result.detections.len(), 1);
    }

    #[test]
    fn test_apply_redactions_in_order() {
        let text = "a@b.com then c@d.org";
        let detections = vec![
            Detection {
                category: PiiCategory::Email,
                text: "a@b.com".into(),
                start: 0,
                end: 7,
                confidence: 0.8,
                source: DetectionSource::Pattern,
            },
            Detection {
                category: PiiCategory::Email,
                text: "c@d.org".into(),
                start: 13,
                end: 20,
                confidence: 0.8,
                source: DetectionSource::Pattern,
            },
        ];
        assert_eq!(
            apply_redactions(text, &detections),
            "[REDACTED_EMAIL] then [REDACTED_EMAIL]"
        );
    }

    #[test]
    fn test_apply_redactions_clamps_bad_offsets() {
        let text = "héllo";
        let detections = vec![Detection {
            category: PiiCategory::Password,
            text: "é".into(),
            start: 2,
            end: 99,
            confidence: 0.9,
            source: DetectionSource::Llm,
        }];
        // Start 2 falls inside 'é' and snaps back to 1.
        assert_eq!(apply_redactions(text, &detections), "h[REDACTED_PASSWORD]");
    }
}
