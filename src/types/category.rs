//! Category and categorization result types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel category assigned when no tier produces a match
pub const UNCATEGORIZED: &str = "Uncategorized";

/// A spending category with its ordered keyword list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            name: name.into(),
            keywords,
        }
    }

    /// Category carrying only a name (direct mapping and AI results)
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn uncategorized() -> Self {
        Self::named(UNCATEGORIZED)
    }

    pub fn is_uncategorized(&self) -> bool {
        self.name == UNCATEGORIZED
    }
}

/// Categorization tier that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Direct,
    Keyword,
    Ai,
    None,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Direct => "direct",
            Tier::Keyword => "keyword",
            Tier::Ai => "ai",
            Tier::None => "none",
        };
        f.write_str(name)
    }
}

/// Outcome of running a transaction through the tier chain
///
/// `error` is informational only: categorization failures never abort the
/// pipeline, they degrade to [`UNCATEGORIZED`].
#[derive(Debug, Clone, PartialEq)]
pub struct CategorizationResult {
    pub category: Category,
    pub source: Tier,
    pub error: Option<String>,
}

impl CategorizationResult {
    pub fn matched(category: Category, source: Tier) -> Self {
        Self {
            category,
            source,
            error: None,
        }
    }

    pub fn uncategorized() -> Self {
        Self {
            category: Category::uncategorized(),
            source: Tier::None,
            error: None,
        }
    }
}
