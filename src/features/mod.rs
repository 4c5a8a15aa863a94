//! Feature computation
//!
//! Leakage-safe team, player, matchup and context features. Every engine
//! takes an explicit cutoff date and only reads games played before it.

pub mod advanced;
pub mod aggregator;
pub mod batch;
pub mod contextual;
pub mod importance;
pub mod injury;
pub mod market;
pub mod matchup;
pub mod nullable;
pub mod rolling;
pub mod schema;

pub use advanced::{AdvancedMetrics, AdvancedMetricsEngine};
pub use aggregator::{FeatureAggregator, VectorOptions};
pub use batch::{MatrixFormat, SeasonBatch, TrainingMatrix};
pub use contextual::{ContextualEngine, GameContext, TeamContext};
pub use importance::{PlayerImportance, PlayerImportanceScorer};
pub use injury::{InjuryImpact, InjuryImpactEngine, RealtimeInjuries};
pub use matchup::{HeadToHead, MatchupEngine};
pub use rolling::{RollingStats, RollingStatsEngine};
pub use schema::{FeatureCategory, FeatureSchema, FeatureVector, SchemaManifest, SCHEMA_VERSION};
