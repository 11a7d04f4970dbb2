//! Payee classification rules
//!
//! Picks the counter-account for an imported row from its payee text.

use serde::{Deserialize, Serialize};

/// Case-insensitive payee substring mapped to a counter-account label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub pattern: String,
    pub account: String,
}

impl ClassificationRule {
    pub fn new(pattern: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            account: account.into(),
        }
    }

    pub fn matches(&self, payee: &str) -> bool {
        let pattern = self.pattern.trim().to_lowercase();
        !pattern.is_empty() && payee.to_lowercase().contains(&pattern)
    }
}

/// Account label of the first matching rule
pub fn classify<'a>(rules: &'a [ClassificationRule], payee: &str) -> Option<&'a str> {
    rules
        .iter()
        .find(|rule| rule.matches(payee))
        .map(|rule| rule.account.as_str())
}
