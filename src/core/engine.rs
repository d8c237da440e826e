//! Hybrid categorization engine
//!
//! The engine runs a transaction through its tiers in a fixed order (direct
//! mapping, keywords, AI) and stops at the first match. It owns no global
//! state: the [`CategoryStore`] and the AI dependencies are injected at
//! construction and shared through `Arc`, so one engine can serve many
//! worker threads at once.
//!
//! The engine enforces:
//! - Blank party names skip every tier and come back "Uncategorized"
//! - A miss on every tier is "Uncategorized", never an error
//! - An AI match is written back to the store before the result is returned,
//!   so the next transaction for the same party hits the direct tier

use crate::core::category_store::CategoryStore;
use crate::core::rate_limiter::RateLimiter;
use crate::core::strategies::{AiStrategy, DirectMappingStrategy, KeywordStrategy};
use crate::core::traits::{AiClient, CategorizationStrategy};
use crate::types::{CategorizationResult, StatementError, Tier, Transaction};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-tier hit counters for a run
#[derive(Debug, Default)]
pub struct EngineStats {
    direct: AtomicUsize,
    keyword: AtomicUsize,
    ai: AtomicUsize,
    uncategorized: AtomicUsize,
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub direct: usize,
    pub keyword: usize,
    pub ai: usize,
    pub uncategorized: usize,
}

impl StatsSnapshot {
    pub fn total(&self) -> usize {
        self.direct + self.keyword + self.ai + self.uncategorized
    }
}

impl EngineStats {
    fn record(&self, tier: Tier) {
        let counter = match tier {
            Tier::Direct => &self.direct,
            Tier::Keyword => &self.keyword,
            Tier::Ai => &self.ai,
            Tier::None => &self.uncategorized,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            direct: self.direct.load(Ordering::Relaxed),
            keyword: self.keyword.load(Ordering::Relaxed),
            ai: self.ai.load(Ordering::Relaxed),
            uncategorized: self.uncategorized.load(Ordering::Relaxed),
        }
    }
}

/// Categorization engine composing the tier chain
pub struct CategorizationEngine {
    store: Arc<CategoryStore>,
    strategies: Vec<Box<dyn CategorizationStrategy>>,
    stats: EngineStats,
}

impl CategorizationEngine {
    /// Engine with the direct and keyword tiers only
    pub fn new(store: Arc<CategoryStore>) -> Self {
        let strategies: Vec<Box<dyn CategorizationStrategy>> = vec![
            Box::new(DirectMappingStrategy::new(Arc::clone(&store))),
            Box::new(KeywordStrategy::new(&store)),
        ];
        Self::with_strategies(store, strategies)
    }

    /// Engine with all three tiers
    pub fn with_ai(
        store: Arc<CategoryStore>,
        client: Arc<dyn AiClient>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let strategies: Vec<Box<dyn CategorizationStrategy>> = vec![
            Box::new(DirectMappingStrategy::new(Arc::clone(&store))),
            Box::new(KeywordStrategy::new(&store)),
            Box::new(AiStrategy::new(client, limiter, store.category_names())),
        ];
        Self::with_strategies(store, strategies)
    }

    /// Engine over an explicit tier list, consulted in the given order
    pub fn with_strategies(
        store: Arc<CategoryStore>,
        strategies: Vec<Box<dyn CategorizationStrategy>>,
    ) -> Self {
        Self {
            store,
            strategies,
            stats: EngineStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<CategoryStore> {
        &self.store
    }

    /// Run the tier chain for one transaction
    pub fn categorize(&self, tx: &Transaction) -> CategorizationResult {
        let result = self.run_tiers(tx);
        self.stats.record(result.source);
        result
    }

    fn run_tiers(&self, tx: &Transaction) -> CategorizationResult {
        if tx.party_name.trim().is_empty() {
            debug!("blank party name, skipping categorization");
            return CategorizationResult::uncategorized();
        }

        for strategy in &self.strategies {
            let Some(category) = strategy.try_match(tx) else {
                continue;
            };
            let tier = strategy.tier();

            if tier == Tier::Ai {
                self.store
                    .learn(&tx.party_name, tx.is_debtor, &category.name);
            }

            debug!(party = %tx.party_name, category = %category.name, %tier, "categorized");
            return CategorizationResult::matched(category, tier);
        }

        CategorizationResult::uncategorized()
    }

    /// Return a copy of `tx` carrying its category
    pub fn categorize_transaction(&self, tx: &Transaction) -> Transaction {
        let result = self.categorize(tx);
        tx.with_category(result.category.name)
    }

    /// Tier hit counts since construction
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Persist learned mappings
    ///
    /// Callers treat a failure as a warning; the categorized output is still valid.
    pub fn flush(&self) -> Result<(), StatementError> {
        let pending = self.store.pending_changes();
        if pending == 0 {
            return Ok(());
        }
        self.store.save()?;
        info!(learned = pending, "flushed learned mappings");
        Ok(())
    }
}
