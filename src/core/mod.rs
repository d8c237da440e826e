//! Core categorization module
//!
//! This module contains the categorization components:
//! - `traits` - Tier and collaborator abstractions
//! - `category_store` - Category rules and learned party mappings
//! - `rate_limiter` - Non-blocking call budget for the AI tier
//! - `strategies` - Direct, keyword, and AI tiers
//! - `engine` - Tier chain orchestration and auto-learning

pub mod category_store;
pub mod engine;
pub mod rate_limiter;
pub mod strategies;
pub mod traits;

pub use category_store::{CategoryStore, StorePaths};
pub use engine::{CategorizationEngine, StatsSnapshot};
pub use rate_limiter::RateLimiter;
pub use traits::{AiClient, AiRequest, CategorizationStrategy, StatementParser, StatementWriter};
