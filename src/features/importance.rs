//! Player importance scoring
//!
//! A player's importance is a 0-1 blend of recent scoring, playmaking,
//! rebounding and plus/minus, damped for players who see few minutes.

use crate::data::StatsStore;
use crate::{PlayerId, Result, TeamId};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

const MAX_POINTS: f64 = 35.0;
const MAX_ASSISTS: f64 = 12.0;
const MAX_REBOUNDS: f64 = 15.0;
const MAX_PLUS_MINUS: f64 = 15.0;
const FULL_STARTER_MINUTES: f64 = 36.0;
const GAME_MINUTES: f64 = 48.0;

/// Games with less than a minute played are treated as DNP
const MIN_QUALIFYING_MINUTES: f64 = 1.0;

/// Per-game averages feeding the score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductionAverages {
    pub minutes: f64,
    pub points: f64,
    pub assists: f64,
    pub rebounds: f64,
    pub plus_minus: f64,
}

/// Importance from per-game averages. Always within [0, 1].
pub fn importance_score(avg: &ProductionAverages) -> f64 {
    let norm_pts = (avg.points / MAX_POINTS).min(1.0);
    let norm_ast = (avg.assists / MAX_ASSISTS).min(1.0);
    let norm_reb = (avg.rebounds / MAX_REBOUNDS).min(1.0);
    let norm_pm = ((avg.plus_minus / MAX_PLUS_MINUS).clamp(-1.0, 1.0) + 1.0) / 2.0;

    let weighted = 0.40 * norm_pts + 0.25 * norm_ast + 0.20 * norm_reb + 0.15 * norm_pm;
    let minutes_factor = (avg.minutes / FULL_STARTER_MINUTES).min(1.0);
    (weighted * (0.5 + 0.5 * minutes_factor)).clamp(0.0, 1.0)
}

/// A scored player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerImportance {
    pub player_id: PlayerId,
    pub player_name: String,
    pub team_id: TeamId,
    pub score: f64,
    pub averages: ProductionAverages,
    pub games_played: usize,
    /// Share of a regulation game spent on the floor
    pub usage_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ImportanceKey {
    player: PlayerId,
    team: TeamId,
    as_of: NaiveDate,
    games_back: usize,
}

/// Scores players from their recent box scores, memoized per
/// (player, team, cutoff, lookback).
///
/// The memo belongs to one scorer instance. Callers working on unrelated
/// games in parallel use one scorer each.
pub struct PlayerImportanceScorer<'s, S: StatsStore + ?Sized> {
    store: &'s S,
    min_games: usize,
    cache: HashMap<ImportanceKey, Option<PlayerImportance>>,
}

impl<'s, S: StatsStore + ?Sized> PlayerImportanceScorer<'s, S> {
    pub fn new(store: &'s S, min_games: usize) -> Self {
        PlayerImportanceScorer {
            store,
            min_games,
            cache: HashMap::new(),
        }
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Importance of `player` for `team` from the last `games_back`
    /// appearances before `as_of`. `None` with fewer than `min_games`
    /// qualifying games.
    pub fn importance(
        &mut self,
        player: PlayerId,
        team: TeamId,
        games_back: usize,
        as_of: NaiveDate,
    ) -> Result<Option<PlayerImportance>> {
        let key = ImportanceKey {
            player,
            team,
            as_of,
            games_back,
        };
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        let scored = self.compute(player, team, games_back, as_of)?;
        self.cache.insert(key, scored.clone());
        Ok(scored)
    }

    fn compute(
        &self,
        player: PlayerId,
        team: TeamId,
        games_back: usize,
        as_of: NaiveDate,
    ) -> Result<Option<PlayerImportance>> {
        let lines = self.store.get_player_games(player, team, as_of, games_back)?;
        let played: Vec<_> = lines
            .iter()
            .filter(|(date, line)| *date < as_of && line.minutes >= MIN_QUALIFYING_MINUTES)
            .map(|(_, line)| line)
            .collect();

        if played.is_empty() || played.len() < self.min_games {
            return Ok(None);
        }

        let n = played.len() as f64;
        let mut totals = ProductionAverages {
            minutes: 0.0,
            points: 0.0,
            assists: 0.0,
            rebounds: 0.0,
            plus_minus: 0.0,
        };
        for line in &played {
            totals.minutes += line.minutes;
            totals.points += f64::from(line.points);
            totals.assists += f64::from(line.assists);
            totals.rebounds += f64::from(line.rebounds);
            totals.plus_minus += line.plus_minus.map(f64::from).unwrap_or(0.0);
        }
        let averages = ProductionAverages {
            minutes: totals.minutes / n,
            points: totals.points / n,
            assists: totals.assists / n,
            rebounds: totals.rebounds / n,
            plus_minus: totals.plus_minus / n,
        };

        Ok(Some(PlayerImportance {
            player_id: player,
            player_name: played[0].player_name.clone(),
            team_id: team,
            score: importance_score(&averages),
            averages,
            games_played: played.len(),
            usage_rate: averages.minutes / GAME_MINUTES,
        }))
    }

    /// Every player who appeared for `team` in its last `games_back` games
    /// before `as_of` and has a score, most important first.
    pub fn team_importances(
        &mut self,
        team: TeamId,
        games_back: usize,
        as_of: NaiveDate,
    ) -> Result<Vec<PlayerImportance>> {
        let games = self.store.get_team_games(team, as_of, games_back)?;
        let mut players = BTreeSet::new();
        for game in games.iter().filter(|g| g.date < as_of) {
            for line in self.store.get_player_box_scores(&game.game_id, team)? {
                players.insert(line.player_id);
            }
        }

        let mut scored = Vec::new();
        for player in players {
            if let Some(importance) = self.importance(player, team, games_back, as_of)? {
                scored.push(importance);
            }
        }
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        Ok(scored)
    }

    /// The `n` most important players
    pub fn top_players(
        &mut self,
        team: TeamId,
        n: usize,
        games_back: usize,
        as_of: NaiveDate,
    ) -> Result<Vec<PlayerImportance>> {
        let mut all = self.team_importances(team, games_back, as_of)?;
        all.truncate(n);
        Ok(all)
    }

    /// Sum of all scored players' importance; `None` when nobody scores
    pub fn team_total_importance(
        &mut self,
        team: TeamId,
        games_back: usize,
        as_of: NaiveDate,
    ) -> Result<Option<f64>> {
        let all = self.team_importances(team, games_back, as_of)?;
        if all.is_empty() {
            return Ok(None);
        }
        Ok(Some(all.iter().map(|p| p.score).sum()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{day, League};
    use crate::InjuryStatus;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn averages(minutes: f64, points: f64, assists: f64, rebounds: f64, pm: f64) -> ProductionAverages {
        ProductionAverages {
            minutes,
            points,
            assists,
            rebounds,
            plus_minus: pm,
        }
    }

    #[test]
    fn test_all_star_line() {
        let score = importance_score(&averages(35.0, 27.0, 8.0, 8.0, 6.0));
        assert_relative_eq!(score, 0.6774, epsilon = 1e-3);
        assert!((score - 0.68).abs() < 0.01);
    }

    #[test]
    fn test_score_extremes() {
        let maxed = importance_score(&averages(40.0, 40.0, 15.0, 20.0, 20.0));
        assert_relative_eq!(maxed, 1.0, epsilon = 1e-12);

        let bench = importance_score(&averages(2.0, 0.0, 0.0, 0.0, -15.0));
        assert!(bench < 0.01, "got {}", bench);

        // efficient in limited minutes is capped well below a starter
        let spark = importance_score(&averages(12.0, 18.0, 3.0, 3.0, 5.0));
        let starter = importance_score(&averages(36.0, 18.0, 3.0, 3.0, 5.0));
        assert!(spark < starter);
    }

    proptest! {
        #[test]
        fn prop_score_stays_in_unit_interval(
            minutes in 0.0f64..60.0,
            points in 0.0f64..80.0,
            assists in 0.0f64..30.0,
            rebounds in 0.0f64..35.0,
            pm in -60.0f64..60.0,
        ) {
            let score = importance_score(&averages(minutes, points, assists, rebounds, pm));
            prop_assert!(score.is_finite());
            prop_assert!((0.0..=1.0).contains(&score), "score {}", score);
        }
    }

    #[test]
    fn test_importance_requires_qualifying_games() {
        let mut league = League::new();
        for d in 1..=4 {
            let id = league.finished(day(d), 1, 2, 100, 90);
            if d == 2 {
                league.unavailable(&id, 1, 7, "Sam Guard", InjuryStatus::Out);
            } else {
                league.player(&id, 1, 7, "Sam Guard", 30.0, 20, 5, 4, Some(3));
            }
        }
        let mut scorer = PlayerImportanceScorer::new(&league.db, 3);
        let scored = scorer
            .importance(PlayerId(7), TeamId(1), 20, day(10))
            .unwrap()
            .unwrap();
        assert_eq!(scored.games_played, 3);
        assert_relative_eq!(scored.averages.points, 20.0);
        assert_relative_eq!(scored.usage_rate, 30.0 / 48.0);

        // only days 1 and 2 are visible, and day 2 was a DNP
        let early = scorer.importance(PlayerId(7), TeamId(1), 20, day(3)).unwrap();
        assert!(early.is_none());
    }

    #[test]
    fn test_memo_and_clear() {
        let mut league = League::new();
        for d in 1..=3 {
            let id = league.finished(day(d), 1, 2, 100, 90);
            league.player(&id, 1, 7, "Sam Guard", 30.0, 20, 5, 4, None);
        }
        let mut scorer = PlayerImportanceScorer::new(&league.db, 3);
        let first = scorer.importance(PlayerId(7), TeamId(1), 20, day(10)).unwrap();
        scorer.importance(PlayerId(7), TeamId(1), 20, day(10)).unwrap();
        assert_eq!(scorer.cache_len(), 1);

        scorer.importance(PlayerId(7), TeamId(1), 10, day(10)).unwrap();
        scorer.importance(PlayerId(7), TeamId(1), 20, day(9)).unwrap();
        assert_eq!(scorer.cache_len(), 3);

        scorer.clear_cache();
        assert_eq!(scorer.cache_len(), 0);
        let again = scorer.importance(PlayerId(7), TeamId(1), 20, day(10)).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_top_players_and_total() {
        let mut league = League::new();
        for d in 1..=3 {
            let id = league.finished(day(d), 1, 2, 100, 90);
            league.player(&id, 1, 1, "Star Player", 36.0, 30, 8, 8, Some(8));
            league.player(&id, 1, 2, "Role Player", 24.0, 10, 2, 5, Some(0));
            league.player(&id, 1, 3, "Deep Bench", 4.0, 2, 0, 1, Some(-2));
        }
        let mut scorer = PlayerImportanceScorer::new(&league.db, 3);
        let all = scorer.team_importances(TeamId(1), 20, day(10)).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].player_name, "Star Player");
        assert!(all.windows(2).all(|p| p[0].score >= p[1].score));
        assert!(all.iter().all(|p| (0.0..=1.0).contains(&p.score)));

        let top = scorer.top_players(TeamId(1), 2, 20, day(10)).unwrap();
        assert_eq!(top.len(), 2);

        let total = scorer.team_total_importance(TeamId(1), 20, day(10)).unwrap().unwrap();
        assert_relative_eq!(total, all.iter().map(|p| p.score).sum::<f64>());
        assert!(scorer.team_total_importance(TeamId(4), 20, day(10)).unwrap().is_none());
    }
}
