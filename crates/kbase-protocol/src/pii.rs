//! PII detection types and the regex-based detector.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use kbase_core::{PiiCategory, Result};

/// Which detector produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionSource {
    Pattern,
    Llm,
}

/// A located span of sensitive text. `start..end` are byte offsets into the scanned content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub category: PiiCategory,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
    pub source: DetectionSource,
}

/// Merged outcome of a detection pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    pub has_pii: bool,
    pub categories_found: Vec<PiiCategory>,
    pub detections: Vec<Detection>,
    /// Set by `PiiEngine::redact`: the rewritten content, or the input unchanged when clean.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted_content: Option<String>,
}

impl DetectionResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A detector that locates PII spans of the requested categories.
#[async_trait]
pub trait PiiSource: Send + Sync {
    async fn detect(&self, text: &str, categories: &[PiiCategory]) -> Result<Vec<Detection>>;

    /// Detector name for logging.
    fn name(&self) -> &str;
}

const PATTERN_CONFIDENCE: f32 = 0.8;

// Where a pattern has a capture group, only group 1 is the sensitive value.
const PASSWORD_PATTERNS: &[&str] = &[
    r#"(?:password|passwd)(?:\s+is\s*[:=]?|\s*[:=])\s*['"]?([^\s'"]+)['"]?"#,
    r#"pwd\s*[:=]\s*['"]?([^\s'"]+)['"]?"#,
    r#"pass\s*[:=]\s*['"]?([^\s'"]+)['"]?"#,
];
const API_KEY_PATTERNS: &[&str] = &[
    r#"api[_-]?key\s*[:=]\s*['"]?([a-zA-Z0-9_-]{20,})['"]?"#,
    r#"secret[_-]?key\s*[:=]\s*['"]?([a-zA-Z0-9_-]{20,})['"]?"#,
    r#"access[_-]?token\s*[:=]\s*['"]?([a-zA-Z0-9_-]{20,})['"]?"#,
    r"sk-[a-zA-Z0-9]{32,}",
    r"pk-[a-zA-Z0-9]{32,}",
    r"AIza[a-zA-Z0-9_-]{35}",
];
const CREDIT_CARD_PATTERNS: &[&str] = &[
    r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|3[47][0-9]{13}|6(?:011|5[0-9]{2})[0-9]{12})\b",
];
const SSN_PATTERNS: &[&str] = &[r"\b\d{3}[-\s]?\d{2}[-\s]?\d{4}\b"];
const EMAIL_PATTERNS: &[&str] = &[r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"];
const PHONE_PATTERNS: &[&str] = &[
    r"\b(?:\+?1[-.\s]?)?\(?[2-9]\d{2}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
    r"\b\d{3}[-.\s]\d{3}[-.\s]\d{4}\b",
];
const ADDRESS_PATTERNS: &[&str] = &[
    r"\b\d{1,5}\s+\w+(?:\s+\w+)*\s+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Drive|Dr|Lane|Ln|Court|Ct)\b",
];

fn patterns_for(category: PiiCategory) -> &'static [&'static str] {
    match category {
        PiiCategory::Password => PASSWORD_PATTERNS,
        PiiCategory::ApiKey => API_KEY_PATTERNS,
        PiiCategory::CreditCard => CREDIT_CARD_PATTERNS,
        PiiCategory::Ssn => SSN_PATTERNS,
        PiiCategory::Email => EMAIL_PATTERNS,
        PiiCategory::Phone => PHONE_PATTERNS,
        PiiCategory::Address => ADDRESS_PATTERNS,
    }
}

// Compiled once, case-insensitive, reused by every detector instance.
static COMPILED: Lazy<Vec<(PiiCategory, Vec<Regex>)>> = Lazy::new(|| {
    PiiCategory::ALL
        .iter()
        .map(|&category| {
            let regexes = patterns_for(category)
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .expect("built-in PII pattern must compile")
                })
                .collect();
            (category, regexes)
        })
        .collect()
});

/// Deterministic regex detector. Never fails, always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternDetector;

impl PatternDetector {
    pub fn new() -> Self {
        Self
    }

    /// Scan `text` for the given categories, in category then pattern order.
    pub fn scan(&self, text: &str, categories: &[PiiCategory]) -> Vec<Detection> {
        let mut detections = Vec::new();

        for (category, regexes) in COMPILED.iter() {
            if !categories.contains(category) {
                continue;
            }
            for regex in regexes {
                for caps in regex.captures_iter(text) {
                    let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                        continue;
                    };
                    if m.start() >= m.end() {
                        continue;
                    }
                    detections.push(Detection {
                        category: *category,
                        text: m.as_str().to_string(),
                        start: m.start(),
                        end: m.end(),
                        confidence: PATTERN_CONFIDENCE,
                        source: DetectionSource::Pattern,
                    });
                }
            }
        }

        detections
    }
}

#[async_trait]
impl PiiSource for PatternDetector {
    async fn detect(&self, text: &str, categories: &[PiiCategory]) -> Result<Vec<Detection>> {
        Ok(self.scan(text, categories))
    }

    fn name(&self) -> &str {
        "pattern"
    }
}
