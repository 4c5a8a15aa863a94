//! Feature schema contract
//!
//! The schema is the ordered list of feature names a model is trained on.
//! Training-time bulk generation and serving-time single-game generation
//! both build vectors through [`FeatureVectorBuilder`], which rejects any
//! name outside the schema and refuses to finish while a name is unset.

use crate::data::StoredFeature;
use crate::{FeatureConfig, GameId, HoopsError, Result, TeamId};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Bumped whenever names, order or semantics of existing features change
pub const SCHEMA_VERSION: u32 = 1;

/// Rolling windows up to this size also carry the detailed box score set
const DETAILED_WINDOW_MAX: usize = 10;

/// Whether a rolling window emits FT%, rebounds, assists, turnovers,
/// steals and blocks on top of the base set
pub fn is_detailed_window(window: usize) -> bool {
    window <= DETAILED_WINDOW_MAX
}

/// Per-team features, emitted once with `home_` and once with `away_`
const TEAM_FEATURES: &[&str] = &[
    "offensive_rating",
    "defensive_rating",
    "net_rating",
    "pace",
    "true_shooting_pct",
    "effective_fg_pct",
    "rebound_rate",
    "offensive_rebound_pct",
    "defensive_rebound_pct",
    "assist_rate",
    "steal_rate",
    "block_rate",
    "turnover_rate",
    "win_pct",
    "avg_point_differential",
    "avg_points_for",
    "avg_points_against",
    "win_streak",
    "loss_streak",
    "home_split_win_pct",
    "away_split_win_pct",
];

const WINDOW_FEATURES: &[&str] = &["points", "points_allowed", "fg_pct", "three_pct", "win_pct"];

const DETAILED_WINDOW_FEATURES: &[&str] = &[
    "ft_pct",
    "rebounds",
    "assists",
    "turnovers",
    "steals",
    "blocks",
];

const INJURY_FEATURES: &[&str] = &[
    "players_out",
    "players_questionable",
    "injury_severity_score",
    "weighted_injury_score",
    "weighted_severity_score",
    "key_player_out",
    "key_players_out_count",
    "total_importance_out",
    "injury_win_pct_delta",
    "injury_point_diff_delta",
];

const TEAM_CONTEXT_FEATURES: &[&str] = &["rest_days", "is_b2b", "days_until_next", "games_last_7_days"];

const MATCHUP_FEATURES: &[&str] = &[
    "h2h_home_wins",
    "h2h_away_wins",
    "h2h_total_games",
    "h2h_avg_point_differential",
    "h2h_home_avg_score",
    "h2h_away_avg_score",
    "pace_differential",
    "ts_differential",
    "efg_differential",
    "win_pct_differential",
    "injury_advantage",
    "key_player_advantage",
    "importance_advantage",
];

const GAME_CONTEXT_FEATURES: &[&str] = &[
    "rest_days_differential",
    "same_conference",
    "same_division",
    "is_playoffs",
];

const BETTING_FEATURES: &[&str] = &[
    "consensus_spread",
    "consensus_total",
    "home_moneyline_prob",
    "away_moneyline_prob",
];

/// Persisted category of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    Team,
    Matchup,
    Contextual,
    Betting,
}

impl FeatureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureCategory::Team => "team",
            FeatureCategory::Matchup => "matchup",
            FeatureCategory::Contextual => "contextual",
            FeatureCategory::Betting => "betting",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "team" => Some(FeatureCategory::Team),
            "matchup" => Some(FeatureCategory::Matchup),
            "contextual" => Some(FeatureCategory::Contextual),
            "betting" => Some(FeatureCategory::Betting),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn prefix(&self) -> &'static str {
        match self {
            Side::Home => "home_",
            Side::Away => "away_",
        }
    }
}

/// One schema entry
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    pub name: String,
    pub category: FeatureCategory,
    /// Which team a per-team feature describes
    pub side: Option<Side>,
}

/// Names as shipped alongside a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaManifest {
    pub schema_version: u32,
    /// Rolling windows the names were generated for; empty when unknown
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub windows: Vec<usize>,
    pub feature_names: Vec<String>,
}

/// FNV-1a over the version and the ordered names
fn layout_fingerprint(version: u32, names: &[String]) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET;
    let mut feed = |bytes: &[u8]| {
        for &b in bytes {
            hash ^= u32::from(b);
            hash = hash.wrapping_mul(PRIME);
        }
    };
    feed(&version.to_le_bytes());
    for name in names {
        feed(name.as_bytes());
        feed(&[0]);
    }
    hash
}

/// Ordered, versioned feature-name contract
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    version: u32,
    cache_version: u32,
    windows: Vec<usize>,
    specs: Arc<[FeatureSpec]>,
    names: Arc<[String]>,
    index: Arc<HashMap<String, usize>>,
}

impl FeatureSchema {
    /// Schema for the given rolling windows
    pub fn new(windows: &[usize]) -> Self {
        let mut windows = windows.to_vec();
        windows.sort_unstable();
        windows.dedup();

        let mut specs = Vec::new();
        for side in [Side::Home, Side::Away] {
            let p = side.prefix();
            let mut push = |name: String, category: FeatureCategory| {
                specs.push(FeatureSpec {
                    name,
                    category,
                    side: Some(side),
                })
            };
            for f in TEAM_FEATURES {
                push(format!("{p}{f}"), FeatureCategory::Team);
            }
            for &w in &windows {
                for f in WINDOW_FEATURES {
                    push(format!("{p}l{w}_{f}"), FeatureCategory::Team);
                }
                if is_detailed_window(w) {
                    for f in DETAILED_WINDOW_FEATURES {
                        push(format!("{p}l{w}_{f}"), FeatureCategory::Team);
                    }
                }
            }
            for f in INJURY_FEATURES {
                push(format!("{p}{f}"), FeatureCategory::Team);
            }
            for f in TEAM_CONTEXT_FEATURES {
                push(format!("{p}{f}"), FeatureCategory::Contextual);
            }
        }

        let shared = [
            (MATCHUP_FEATURES, FeatureCategory::Matchup),
            (GAME_CONTEXT_FEATURES, FeatureCategory::Contextual),
            (BETTING_FEATURES, FeatureCategory::Betting),
        ];
        for (names, category) in shared {
            for name in names {
                specs.push(FeatureSpec {
                    name: name.to_string(),
                    category,
                    side: None,
                });
            }
        }

        let names: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();

        FeatureSchema {
            version: SCHEMA_VERSION,
            cache_version: layout_fingerprint(SCHEMA_VERSION, &names),
            windows,
            specs: specs.into(),
            names: names.into(),
            index: Arc::new(index),
        }
    }

    pub fn from_config(config: &FeatureConfig) -> Self {
        Self::new(&config.windows)
    }

    /// Schema under the default configuration
    pub fn current() -> Self {
        Self::from_config(&FeatureConfig::default())
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Cache key for this exact layout. Schemas built from different
    /// window sets never share cached rows.
    pub fn cache_version(&self) -> u32 {
        self.cache_version
    }

    pub fn windows(&self) -> &[usize] {
        &self.windows
    }

    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn specs(&self) -> &[FeatureSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn manifest(&self) -> SchemaManifest {
        SchemaManifest {
            schema_version: self.version,
            windows: self.windows.clone(),
            feature_names: self.names.to_vec(),
        }
    }

    /// Fail unless `names` equals this schema's names, in order
    pub fn ensure_matches(&self, version: u32, names: &[String]) -> Result<()> {
        let mismatch = |detail: String| HoopsError::SchemaMismatch {
            expected: self.version,
            actual: version,
            detail,
        };

        if version != self.version {
            return Err(mismatch("schema version differs".to_string()));
        }
        if let Some((i, (want, got))) = self
            .names
            .iter()
            .zip(names)
            .enumerate()
            .find(|(_, (want, got))| want != got)
        {
            return Err(mismatch(format!(
                "position {}: expected '{}', found '{}'",
                i, want, got
            )));
        }
        if names.len() != self.names.len() {
            return Err(mismatch(format!(
                "expected {} features, found {}",
                self.names.len(),
                names.len()
            )));
        }
        Ok(())
    }

    pub fn ensure_manifest(&self, manifest: &SchemaManifest) -> Result<()> {
        if !manifest.windows.is_empty() && manifest.windows != self.windows {
            return Err(HoopsError::SchemaMismatch {
                expected: self.version,
                actual: manifest.schema_version,
                detail: format!(
                    "windows {:?} differ from configured {:?}",
                    manifest.windows, self.windows
                ),
            });
        }
        self.ensure_matches(manifest.schema_version, &manifest.feature_names)
    }

    pub fn builder(&self, game_id: GameId) -> FeatureVectorBuilder {
        FeatureVectorBuilder {
            schema: self.clone(),
            game_id,
            values: vec![None; self.len()],
        }
    }

    /// Rebuild a vector from cached rows. The rows must cover the schema
    /// exactly, in order.
    pub fn vector_from_stored(&self, game_id: GameId, stored: &[StoredFeature]) -> Result<FeatureVector> {
        let names: Vec<String> = stored.iter().map(|f| f.name.clone()).collect();
        self.ensure_matches(self.version, &names)?;
        let mut builder = self.builder(game_id);
        for feature in stored {
            builder.set(&feature.name, feature.value)?;
        }
        builder.finish()
    }
}

/// Collects values by name for one game
#[derive(Debug, Clone)]
pub struct FeatureVectorBuilder {
    schema: FeatureSchema,
    game_id: GameId,
    values: Vec<Option<Option<f64>>>,
}

impl FeatureVectorBuilder {
    pub fn set(&mut self, name: &str, value: Option<f64>) -> Result<()> {
        let i = self
            .schema
            .position(name)
            .ok_or_else(|| HoopsError::UnknownFeature(name.to_string()))?;
        self.values[i] = Some(value.filter(|v| v.is_finite()));
        Ok(())
    }

    pub fn set_flag(&mut self, name: &str, value: Option<bool>) -> Result<()> {
        self.set(name, value.map(|b| if b { 1.0 } else { 0.0 }))
    }

    pub fn set_count(&mut self, name: &str, value: Option<usize>) -> Result<()> {
        self.set(name, value.map(|n| n as f64))
    }

    pub fn finish(self) -> Result<FeatureVector> {
        let mut values = Vec::with_capacity(self.values.len());
        for (i, v) in self.values.into_iter().enumerate() {
            match v {
                Some(v) => values.push(v),
                None => {
                    return Err(HoopsError::MissingFeature(
                        self.schema.feature_names()[i].clone(),
                    ))
                }
            }
        }
        Ok(FeatureVector {
            game_id: self.game_id,
            schema_version: self.schema.version,
            names: self.schema.names.clone(),
            specs: self.schema.specs.clone(),
            values,
        })
    }
}

/// Ordered name → nullable value mapping for one game
#[derive(Debug, Clone)]
pub struct FeatureVector {
    game_id: GameId,
    schema_version: u32,
    names: Arc<[String]>,
    specs: Arc<[FeatureSpec]>,
    values: Vec<Option<f64>>,
}

impl PartialEq for FeatureVector {
    fn eq(&self, other: &Self) -> bool {
        self.game_id == other.game_id
            && self.schema_version == other.schema_version
            && self.names == other.names
            && self.values == other.values
    }
}

impl FeatureVector {
    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `None` if the name is not in the schema, `Some(None)` for a null value
    pub fn get(&self, name: &str) -> Option<Option<f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Rows for the feature cache, tagged by category and team
    pub fn to_stored(&self, home: TeamId, away: TeamId) -> Vec<StoredFeature> {
        self.specs
            .iter()
            .zip(&self.values)
            .map(|(spec, value)| StoredFeature {
                name: spec.name.clone(),
                value: *value,
                category: spec.category,
                team_id: spec.side.map(|s| match s {
                    Side::Home => home,
                    Side::Away => away,
                }),
            })
            .collect()
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}
