//! Basketball feature engineering
//!
//! Turns per-game box scores and injury reports into fixed-schema feature
//! vectors for win/margin prediction, without looking past the game date.

pub mod data;
pub mod features;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique identifier for a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

/// Unique identifier for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player({})", self.0)
    }
}

/// League game identifier (e.g. "0022300123")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameId(pub String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        GameId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A franchise
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub abbreviation: String,
    /// "East" / "West"
    pub conference: Option<String>,
    pub division: Option<String>,
}

/// Lifecycle of a game record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Scheduled,
    Finished,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::Finished => "finished",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "scheduled" => Some(GameStatus::Scheduled),
            "finished" | "final" => Some(GameStatus::Finished),
            _ => None,
        }
    }
}

/// Regular season or playoffs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonType {
    Regular,
    Playoffs,
}

impl SeasonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonType::Regular => "regular",
            SeasonType::Playoffs => "playoffs",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "regular" | "regular season" => Some(SeasonType::Regular),
            "playoffs" | "playoff" => Some(SeasonType::Playoffs),
            _ => None,
        }
    }
}

/// A scheduled or finished game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: GameId,
    /// Season label, e.g. "2023-24"
    pub season: String,
    pub season_type: SeasonType,
    pub date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub home_score: Option<u16>,
    pub away_score: Option<u16>,
    pub status: GameStatus,
}

impl GameRecord {
    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
            && self.home_score.is_some()
            && self.away_score.is_some()
    }

    /// Returns the winning team (None until the game is finished)
    pub fn winner(&self) -> Option<TeamId> {
        let (home, away) = (self.home_score?, self.away_score?);
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => Some(self.home_team),
            std::cmp::Ordering::Less => Some(self.away_team),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Check if the given team won this game
    pub fn did_win(&self, team: TeamId) -> Option<bool> {
        if team != self.home_team && team != self.away_team {
            return None;
        }
        self.winner().map(|w| w == team)
    }

    /// Get the opponent for a given team
    pub fn opponent(&self, team: TeamId) -> Option<TeamId> {
        if team == self.home_team {
            Some(self.away_team)
        } else if team == self.away_team {
            Some(self.home_team)
        } else {
            None
        }
    }

    /// Check if a team was playing at home
    pub fn is_home(&self, team: TeamId) -> Option<bool> {
        if team == self.home_team {
            Some(true)
        } else if team == self.away_team {
            Some(false)
        } else {
            None
        }
    }

    /// Get score for a specific team
    pub fn score_for(&self, team: TeamId) -> Option<u16> {
        if team == self.home_team {
            self.home_score
        } else if team == self.away_team {
            self.away_score
        } else {
            None
        }
    }

    /// Get score against a specific team
    pub fn score_against(&self, team: TeamId) -> Option<u16> {
        self.opponent(team).and_then(|opp| self.score_for(opp))
    }

    /// Point differential from `team`'s perspective
    pub fn margin_for(&self, team: TeamId) -> Option<i32> {
        Some(self.score_for(team)? as i32 - self.score_against(team)? as i32)
    }

    pub fn involves(&self, team: TeamId) -> bool {
        self.home_team == team || self.away_team == team
    }
}

/// One team's line in a finished game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxScoreRecord {
    pub game_id: GameId,
    pub team_id: TeamId,
    pub is_home: bool,
    pub points: u16,
    pub field_goals_made: u16,
    pub field_goals_attempted: u16,
    pub three_pointers_made: u16,
    pub three_pointers_attempted: u16,
    pub free_throws_made: u16,
    pub free_throws_attempted: u16,
    pub offensive_rebounds: Option<u16>,
    pub defensive_rebounds: Option<u16>,
    pub total_rebounds: Option<u16>,
    pub assists: Option<u16>,
    pub steals: Option<u16>,
    pub blocks: Option<u16>,
    pub turnovers: Option<u16>,
    pub personal_fouls: Option<u16>,
}

impl BoxScoreRecord {
    /// Total rebounds, falling back to ORB + DRB when the total was not recorded
    pub fn rebounds(&self) -> Option<u16> {
        self.total_rebounds.or_else(|| {
            Some(self.offensive_rebounds? + self.defensive_rebounds?)
        })
    }
}

/// Availability reported for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjuryStatus {
    Out,
    Questionable,
    Probable,
    Healthy,
}

impl InjuryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjuryStatus::Out => "out",
            InjuryStatus::Questionable => "questionable",
            InjuryStatus::Probable => "probable",
            InjuryStatus::Healthy => "healthy",
        }
    }

    /// Normalise a free-text report status. Unknown text counts as healthy.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "out" | "inactive" | "suspended" | "out for season" => InjuryStatus::Out,
            "questionable" | "doubtful" | "game time decision" | "gtd" => {
                InjuryStatus::Questionable
            }
            "probable" | "day-to-day" | "day to day" => InjuryStatus::Probable,
            _ => InjuryStatus::Healthy,
        }
    }

    pub fn is_healthy(&self) -> bool {
        *self == InjuryStatus::Healthy
    }
}

impl fmt::Display for InjuryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One player's line in a finished game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerBoxScoreRecord {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub team_id: TeamId,
    /// Minutes played as decimal minutes (0 for DNP/DND)
    pub minutes: f64,
    pub points: u16,
    pub rebounds: u16,
    pub assists: u16,
    pub field_goals_made: u16,
    pub field_goals_attempted: u16,
    pub three_pointers_made: u16,
    pub three_pointers_attempted: u16,
    pub free_throws_made: u16,
    pub free_throws_attempted: u16,
    pub plus_minus: Option<i16>,
    pub injury_status: InjuryStatus,
}

/// Parse a minutes string ("34:30", "28", "DNP") into decimal minutes
pub fn parse_minutes(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }
    match raw.to_uppercase().as_str() {
        "DNP" | "DND" | "NWT" | "0:00" | "00:00" => return 0.0,
        _ => {}
    }

    if let Some((mins, secs)) = raw.split_once(':') {
        let mins: f64 = match mins.parse::<u32>() {
            Ok(m) => m as f64,
            Err(_) => return 0.0,
        };
        let secs = secs.parse::<u32>().unwrap_or(0) as f64;
        mins + secs / 60.0
    } else {
        raw.parse::<f64>().map(|m| m.max(0.0)).unwrap_or(0.0)
    }
}

/// A sportsbook line for a game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BettingLine {
    pub game_id: GameId,
    pub sportsbook: String,
    pub spread_home: Option<f64>,
    pub moneyline_home: Option<i32>,
    pub moneyline_away: Option<i32>,
    pub over_under: Option<f64>,
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum HoopsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Game not found: {0}")]
    GameNotFound(GameId),

    #[error("Feature schema mismatch (expected v{expected}, got v{actual}): {detail}")]
    SchemaMismatch {
        expected: u32,
        actual: u32,
        detail: String,
    },

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Missing feature: {0}")]
    MissingFeature(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, HoopsError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub features: FeatureConfig,
    pub injury_weights: InjuryWeights,
    pub data: DataConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Exponential decay λ: weight of the game i positions back is e^(-λ·i)
    pub decay_rate: f64,
    pub default_window: usize,
    pub windows: Vec<usize>,
    pub min_games: usize,
    pub historical_min_games: usize,
    pub top_players_count: usize,
    pub importance_games_back: usize,
    pub h2h_games: usize,
    pub historical_games_back: usize,
    pub key_player_min_minutes: f64,
    pub cache_enabled: bool,
}

/// Severity weight per injury status
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InjuryWeights {
    pub out: f64,
    pub questionable: f64,
    pub probable: f64,
    pub healthy: f64,
}

impl InjuryWeights {
    pub fn weight(&self, status: InjuryStatus) -> f64 {
        match status {
            InjuryStatus::Out => self.out,
            InjuryStatus::Questionable => self.questionable,
            InjuryStatus::Probable => self.probable,
            InjuryStatus::Healthy => self.healthy,
        }
    }
}

impl Default for InjuryWeights {
    fn default() -> Self {
        InjuryWeights {
            out: 1.0,
            questionable: 0.5,
            probable: 0.25,
            healthy: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub workers: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            decay_rate: 0.1,
            default_window: 10,
            windows: vec![5, 10, 20],
            min_games: 3,
            historical_min_games: 10,
            top_players_count: 5,
            importance_games_back: 20,
            h2h_games: 5,
            historical_games_back: 20,
            key_player_min_minutes: 5.0,
            cache_enabled: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            features: FeatureConfig::default(),
            injury_weights: InjuryWeights::default(),
            data: DataConfig {
                database_path: "data/hoops.db".to_string(),
            },
            batch: BatchConfig { workers: 4 },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HoopsError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| HoopsError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HoopsError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let f = &self.features;
        if !(0.0..=1.0).contains(&f.decay_rate) {
            return Err(HoopsError::Config(format!(
                "decay_rate must be within [0, 1], got {}",
                f.decay_rate
            )));
        }
        if f.default_window == 0 || f.windows.iter().any(|w| *w == 0) {
            return Err(HoopsError::Config("window sizes must be positive".into()));
        }
        if f.min_games == 0 {
            return Err(HoopsError::Config("min_games must be at least 1".into()));
        }
        if f.top_players_count == 0 {
            return Err(HoopsError::Config(
                "top_players_count must be at least 1".into(),
            ));
        }
        if self.batch.workers == 0 {
            return Err(HoopsError::Config("batch.workers must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(home_score: Option<u16>, away_score: Option<u16>) -> GameRecord {
        GameRecord {
            game_id: GameId::new("g1"),
            season: "2023-24".to_string(),
            season_type: SeasonType::Regular,
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            home_team: TeamId(1),
            away_team: TeamId(2),
            home_score,
            away_score,
            status: if home_score.is_some() {
                GameStatus::Finished
            } else {
                GameStatus::Scheduled
            },
        }
    }

    #[test]
    fn test_game_perspective() {
        let g = game(Some(110), Some(102));
        assert_eq!(g.winner(), Some(TeamId(1)));
        assert_eq!(g.did_win(TeamId(2)), Some(false));
        assert_eq!(g.margin_for(TeamId(2)), Some(-8));
        assert_eq!(g.score_against(TeamId(1)), Some(102));
        assert_eq!(g.did_win(TeamId(9)), None);

        let scheduled = game(None, None);
        assert!(!scheduled.is_finished());
        assert_eq!(scheduled.winner(), None);
    }

    #[test]
    fn test_parse_minutes() {
        assert!((parse_minutes("30:00") - 30.0).abs() < 1e-9);
        assert!((parse_minutes("25:30") - 25.5).abs() < 1e-9);
        assert_eq!(parse_minutes("0:00"), 0.0);
        assert_eq!(parse_minutes("DNP"), 0.0);
        assert_eq!(parse_minutes("dnd"), 0.0);
        assert_eq!(parse_minutes(""), 0.0);
        assert!((parse_minutes("31.5") - 31.5).abs() < 1e-9);
    }

    #[test]
    fn test_injury_status_normalize() {
        assert_eq!(InjuryStatus::normalize("OUT"), InjuryStatus::Out);
        assert_eq!(InjuryStatus::normalize("Doubtful"), InjuryStatus::Questionable);
        assert_eq!(InjuryStatus::normalize("Day-To-Day"), InjuryStatus::Probable);
        assert_eq!(InjuryStatus::normalize("Available"), InjuryStatus::Healthy);
        assert_eq!(InjuryStatus::normalize("???"), InjuryStatus::Healthy);
    }

    #[test]
    fn test_config_roundtrip_and_validation() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.features.windows, vec![5, 10, 20]);
        assert_eq!(parsed.injury_weights.probable, 0.25);
        assert!(parsed.validate().is_ok());

        let mut bad = Config::default();
        bad.batch.workers = 0;
        assert!(bad.validate().is_err());

        let mut bad = Config::default();
        bad.features.decay_rate = -0.1;
        assert!(bad.validate().is_err());
    }
}
