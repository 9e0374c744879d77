//! Enums shared between configuration and the PII engine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Categories of sensitive content the PII engine can detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Password,
    ApiKey,
    CreditCard,
    Ssn,
    Email,
    Phone,
    Address,
}

impl PiiCategory {
    /// Every category, in declaration order.
    pub const ALL: [PiiCategory; 7] = [
        PiiCategory::Password,
        PiiCategory::ApiKey,
        PiiCategory::CreditCard,
        PiiCategory::Ssn,
        PiiCategory::Email,
        PiiCategory::Phone,
        PiiCategory::Address,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PiiCategory::Password => "password",
            PiiCategory::ApiKey => "api_key",
            PiiCategory::CreditCard => "credit_card",
            PiiCategory::Ssn => "ssn",
            PiiCategory::Email => "email",
            PiiCategory::Phone => "phone",
            PiiCategory::Address => "address",
        }
    }

    /// Fixed replacement text used when redacting this category.
    pub fn placeholder(&self) -> &'static str {
        match self {
            PiiCategory::Password => "[REDACTED_PASSWORD]",
            PiiCategory::ApiKey => "[REDACTED_API_KEY]",
            PiiCategory::CreditCard => "[REDACTED_CREDIT_CARD]",
            PiiCategory::Ssn => "[REDACTED_SSN]",
            PiiCategory::Email => "[REDACTED_EMAIL]",
            PiiCategory::Phone => "[REDACTED_PHONE]",
            PiiCategory::Address => "[REDACTED_ADDRESS]",
        }
    }
}

impl std::fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PiiCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        PiiCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| Error::Config(format!("Unknown PII category: {}", s)))
    }
}
