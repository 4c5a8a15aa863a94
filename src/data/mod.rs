//! Data ingestion and storage
//!
//! SQLite storage behind the store traits the feature engines consume.

pub mod bundle;
pub mod database;
pub mod store;

#[cfg(test)]
pub(crate) mod fixtures;

pub use bundle::{ImportSummary, SeasonBundle};
pub use database::{Database, DatabaseStats};
pub use store::{FeatureCache, StatsStore, StoredFeature};
