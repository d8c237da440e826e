//! AI fallback tier
//!
//! The tier checks the rate limiter before anything else and never blocks on
//! it: a denied permit simply means "not matched". Every failure of the
//! external service (network error, timeout, unusable answer) degrades to
//! "not matched" as well, so this tier can only ever add categories.

use crate::core::rate_limiter::RateLimiter;
use crate::core::traits::{AiClient, AiRequest, CategorizationStrategy};
use crate::types::{Category, StatementError, Tier, Transaction, UNCATEGORIZED};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

enum AiFailure {
    Limited,
    Unusable(String),
    Service(StatementError),
}

/// Rate-limited external categorization
pub struct AiStrategy {
    client: Arc<dyn AiClient>,
    limiter: Arc<RateLimiter>,
    allowed_categories: Vec<String>,
    /// Parties whose answer was unusable this run; not queried again
    unresolved: DashMap<String, ()>,
}

impl std::fmt::Debug for AiStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiStrategy")
            .field("limit", &self.limiter.limit())
            .field("allowed_categories", &self.allowed_categories.len())
            .field("unresolved", &self.unresolved.len())
            .finish()
    }
}

impl AiStrategy {
    /// Create the tier; `allowed_categories` may be empty to accept any label
    pub fn new(
        client: Arc<dyn AiClient>,
        limiter: Arc<RateLimiter>,
        allowed_categories: Vec<String>,
    ) -> Self {
        Self {
            client,
            limiter,
            allowed_categories,
            unresolved: DashMap::new(),
        }
    }

    fn request(&self, tx: &Transaction) -> Result<Category, AiFailure> {
        if !self.limiter.allow() {
            return Err(AiFailure::Limited);
        }

        let request = AiRequest::from_transaction(tx, self.allowed_categories.clone());
        let raw = self
            .client
            .categorize(&request)
            .map_err(AiFailure::Service)?;

        self.canonical_label(&raw)
            .map(Category::named)
            .ok_or_else(|| AiFailure::Unusable(raw.trim().to_string()))
    }

    /// Clean up a raw label and map it onto a known category name
    fn canonical_label(&self, raw: &str) -> Option<String> {
        let label = raw
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())?
            .trim_end_matches('.')
            .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '*'))
            .trim_end_matches('.')
            .trim();

        if label.is_empty() || label.eq_ignore_ascii_case(UNCATEGORIZED) {
            return None;
        }

        if self.allowed_categories.is_empty() {
            return Some(label.to_string());
        }

        self.allowed_categories
            .iter()
            .find(|name| name.to_lowercase() == label.to_lowercase())
            .cloned()
    }
}

impl CategorizationStrategy for AiStrategy {
    fn tier(&self) -> Tier {
        Tier::Ai
    }

    fn try_match(&self, tx: &Transaction) -> Option<Category> {
        let party_key = tx.party_name.trim().to_lowercase();
        if self.unresolved.contains_key(&party_key) {
            debug!(party = %tx.party_name, "skipping AI tier for previously unresolved party");
            return None;
        }

        match self.request(tx) {
            Ok(category) => {
                debug!(party = %tx.party_name, category = %category.name, "AI tier matched");
                Some(category)
            }
            Err(AiFailure::Limited) => {
                debug!(party = %tx.party_name, "{}, skipping tier", StatementError::RateLimited);
                None
            }
            Err(AiFailure::Unusable(raw)) => {
                warn!(party = %tx.party_name, response = %raw, "AI tier returned no usable category");
                self.unresolved.insert(party_key, ());
                None
            }
            Err(AiFailure::Service(e)) => {
                warn!(party = %tx.party_name, error = %e, "AI tier failed");
                None
            }
        }
    }
}
