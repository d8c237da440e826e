//! Keyword rule tier

use crate::core::category_store::CategoryStore;
use crate::core::traits::CategorizationStrategy;
use crate::types::{Category, Tier, Transaction};

/// Case-insensitive substring matching against category keyword lists
///
/// Categories are scanned in load order and the first category with any
/// matching keyword wins, regardless of how specific the keyword is.
/// Rules are snapshotted at construction; the engine never edits them.
#[derive(Debug, Clone)]
pub struct KeywordStrategy {
    /// (category, lowercased keywords) in load order
    rules: Vec<(Category, Vec<String>)>,
}

impl KeywordStrategy {
    pub fn new(store: &CategoryStore) -> Self {
        Self::from_categories(store.keywords())
    }

    pub fn from_categories(categories: Vec<Category>) -> Self {
        let rules = categories
            .into_iter()
            .map(|category| {
                let keywords = category
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                (category, keywords)
            })
            .collect();
        Self { rules }
    }
}

impl CategorizationStrategy for KeywordStrategy {
    fn tier(&self) -> Tier {
        Tier::Keyword
    }

    fn try_match(&self, tx: &Transaction) -> Option<Category> {
        let description = tx.description.to_lowercase();
        let party = tx.party_name.to_lowercase();

        self.rules
            .iter()
            .find(|(_, keywords)| {
                keywords
                    .iter()
                    .any(|k| description.contains(k.as_str()) || party.contains(k.as_str()))
            })
            .map(|(category, _)| category.clone())
    }
}
