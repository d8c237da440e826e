//! Direct party mapping tier

use crate::core::category_store::CategoryStore;
use crate::core::traits::CategorizationStrategy;
use crate::types::{Category, Tier, Transaction};
use std::sync::Arc;

/// Looks the party up in the creditor or debtor table
///
/// Credits to the account (`is_debtor == false`) use the creditor table,
/// debits use the debtor table. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct DirectMappingStrategy {
    store: Arc<CategoryStore>,
}

impl DirectMappingStrategy {
    pub fn new(store: Arc<CategoryStore>) -> Self {
        Self { store }
    }
}

impl CategorizationStrategy for DirectMappingStrategy {
    fn tier(&self) -> Tier {
        Tier::Direct
    }

    fn try_match(&self, tx: &Transaction) -> Option<Category> {
        self.store
            .lookup(&tx.party_name, tx.is_debtor)
            .map(Category::named)
    }
}
