//! Store interfaces consumed by the feature engines
//!
//! The engines never talk to SQLite directly. They see a read-only
//! [`StatsStore`] and, for the aggregator, a [`FeatureCache`].

use crate::features::schema::FeatureCategory;
use crate::{
    BettingLine, BoxScoreRecord, GameId, GameRecord, PlayerBoxScoreRecord, PlayerId, Result,
    Team, TeamId,
};
use chrono::NaiveDate;

/// Queryable source of games and box scores.
///
/// Every `before` argument is exclusive: implementations must only return
/// games with `date < before`.
pub trait StatsStore {
    fn get_game(&self, game_id: &GameId) -> Result<Option<GameRecord>>;

    fn get_team(&self, team: TeamId) -> Result<Option<Team>>;

    /// Finished games for `team` strictly before `before`, most recent first.
    fn get_team_games(&self, team: TeamId, before: NaiveDate, limit: usize)
        -> Result<Vec<GameRecord>>;

    fn get_box_score(&self, game_id: &GameId, team: TeamId) -> Result<Option<BoxScoreRecord>>;

    /// Box score of whoever `team` played in `game_id`.
    fn get_opponent_box_score(
        &self,
        game_id: &GameId,
        team: TeamId,
    ) -> Result<Option<BoxScoreRecord>> {
        let game = match self.get_game(game_id)? {
            Some(g) => g,
            None => return Ok(None),
        };
        match game.opponent(team) {
            Some(opponent) => self.get_box_score(game_id, opponent),
            None => Ok(None),
        }
    }

    fn get_player_box_scores(
        &self,
        game_id: &GameId,
        team: TeamId,
    ) -> Result<Vec<PlayerBoxScoreRecord>>;

    /// A player's lines for `team` in finished games before `before`,
    /// most recent first, paired with the game date.
    fn get_player_games(
        &self,
        player: PlayerId,
        team: TeamId,
        before: NaiveDate,
        limit: usize,
    ) -> Result<Vec<(NaiveDate, PlayerBoxScoreRecord)>>;

    /// Date of the team's next scheduled or played game after `after`.
    /// Looks at the schedule only, never at results.
    fn get_next_game_date(&self, team: TeamId, after: NaiveDate) -> Result<Option<NaiveDate>>;

    /// Finished meetings between `a` and `b` before `before`, most recent first.
    fn get_head_to_head(
        &self,
        a: TeamId,
        b: TeamId,
        before: NaiveDate,
        limit: usize,
    ) -> Result<Vec<GameRecord>> {
        let games = self.get_team_games(a, before, limit.saturating_mul(20))?;
        Ok(games
            .into_iter()
            .filter(|g| g.involves(b))
            .take(limit)
            .collect())
    }

    fn get_betting_lines(&self, _game_id: &GameId) -> Result<Vec<BettingLine>> {
        Ok(Vec::new())
    }
}

/// One persisted feature value
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFeature {
    pub name: String,
    pub value: Option<f64>,
    pub category: FeatureCategory,
    pub team_id: Option<TeamId>,
}

/// Persisted feature vectors, keyed by game and schema version
pub trait FeatureCache {
    /// Stored features in schema order. Empty when nothing is cached.
    fn load_features(&self, game_id: &GameId, schema_version: u32) -> Result<Vec<StoredFeature>>;

    /// Replace whatever is stored for `(game_id, schema_version)`.
    fn save_features(
        &self,
        game_id: &GameId,
        schema_version: u32,
        features: &[StoredFeature],
    ) -> Result<()>;
}
