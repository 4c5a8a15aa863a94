//! JSON import bundles
//!
//! The collectors that scrape box scores write one bundle per run. Player
//! minutes and injury statuses arrive in whatever form the source used and
//! are normalised here before they reach the store.

use crate::data::Database;
use crate::{
    parse_minutes, BettingLine, BoxScoreRecord, GameId, GameRecord, InjuryStatus,
    PlayerBoxScoreRecord, PlayerId, Result, Team, TeamId,
};
use serde::Deserialize;
use std::path::Path;

/// Minutes as "MM:SS", "DNP" or a plain number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawMinutes {
    Decimal(f64),
    Text(String),
}

impl RawMinutes {
    pub fn to_minutes(&self) -> f64 {
        match self {
            RawMinutes::Decimal(m) if m.is_finite() => m.max(0.0),
            RawMinutes::Decimal(_) => 0.0,
            RawMinutes::Text(s) => parse_minutes(s),
        }
    }
}

impl Default for RawMinutes {
    fn default() -> Self {
        RawMinutes::Decimal(0.0)
    }
}

/// Player line as produced by the collectors
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlayerLine {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub team_id: TeamId,
    #[serde(default)]
    pub minutes: RawMinutes,
    #[serde(default)]
    pub points: u16,
    #[serde(default)]
    pub rebounds: u16,
    #[serde(default)]
    pub assists: u16,
    #[serde(default)]
    pub field_goals_made: u16,
    #[serde(default)]
    pub field_goals_attempted: u16,
    #[serde(default)]
    pub three_pointers_made: u16,
    #[serde(default)]
    pub three_pointers_attempted: u16,
    #[serde(default)]
    pub free_throws_made: u16,
    #[serde(default)]
    pub free_throws_attempted: u16,
    #[serde(default)]
    pub plus_minus: Option<i16>,
    #[serde(default)]
    pub injury_status: Option<String>,
}

impl RawPlayerLine {
    pub fn normalize(&self) -> PlayerBoxScoreRecord {
        PlayerBoxScoreRecord {
            game_id: self.game_id.clone(),
            player_id: self.player_id,
            player_name: self.player_name.trim().to_string(),
            team_id: self.team_id,
            minutes: self.minutes.to_minutes(),
            points: self.points,
            rebounds: self.rebounds,
            assists: self.assists,
            field_goals_made: self.field_goals_made,
            field_goals_attempted: self.field_goals_attempted,
            three_pointers_made: self.three_pointers_made,
            three_pointers_attempted: self.three_pointers_attempted,
            free_throws_made: self.free_throws_made,
            free_throws_attempted: self.free_throws_attempted,
            plus_minus: self.plus_minus,
            injury_status: self
                .injury_status
                .as_deref()
                .map(InjuryStatus::normalize)
                .unwrap_or(InjuryStatus::Healthy),
        }
    }
}

/// One collector run
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeasonBundle {
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub games: Vec<GameRecord>,
    #[serde(default)]
    pub box_scores: Vec<BoxScoreRecord>,
    #[serde(default)]
    pub player_box_scores: Vec<RawPlayerLine>,
    #[serde(default)]
    pub betting_lines: Vec<BettingLine>,
}

/// Counts written by an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub teams: usize,
    pub games: usize,
    pub box_scores: usize,
    pub player_lines: usize,
    pub betting_lines: usize,
}

impl SeasonBundle {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Write everything in one transaction
    pub fn import_into(&self, db: &Database) -> Result<ImportSummary> {
        let summary = db.in_transaction(|db| {
            for team in &self.teams {
                db.upsert_team(team)?;
            }
            for game in &self.games {
                db.upsert_game(game)?;
            }
            for line in &self.box_scores {
                db.upsert_box_score(line)?;
            }
            for line in &self.player_box_scores {
                db.upsert_player_box_score(&line.normalize())?;
            }
            for line in &self.betting_lines {
                db.upsert_betting_line(line)?;
            }
            Ok(ImportSummary {
                teams: self.teams.len(),
                games: self.games.len(),
                box_scores: self.box_scores.len(),
                player_lines: self.player_box_scores.len(),
                betting_lines: self.betting_lines.len(),
            })
        })?;
        log::info!(
            "Imported {} games, {} team lines, {} player lines",
            summary.games,
            summary.box_scores,
            summary.player_lines
        );
        Ok(summary)
    }
}
