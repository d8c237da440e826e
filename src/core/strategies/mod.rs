//! Categorization tiers
//!
//! Each tier implements [`CategorizationStrategy`](crate::core::traits::CategorizationStrategy)
//! and is consulted by the engine in a fixed order:
//!
//! 1. [`DirectMappingStrategy`] - exact party lookups in the learned tables
//! 2. [`KeywordStrategy`] - keyword rules in category load order
//! 3. [`AiStrategy`] - rate-limited external service

pub mod ai;
pub mod direct;
pub mod keyword;

pub use ai::AiStrategy;
pub use direct::DirectMappingStrategy;
pub use keyword::KeywordStrategy;
