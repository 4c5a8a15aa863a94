//! Decayed rolling team statistics
//!
//! Every computation starts from a window of finished games strictly before
//! the cutoff date, ordered most recent first. The game at index `i` carries
//! weight `e^(-λ·i)`.

use crate::data::StatsStore;
use crate::features::nullable::{flag, WeightedRatio, WeightedTotal};
use crate::{BoxScoreRecord, FeatureConfig, GameRecord, Result, TeamId};
use chrono::NaiveDate;

/// Weights for `n` games, most recent first
pub fn decay_weights(n: usize, decay_rate: f64) -> Vec<f64> {
    (0..n).map(|i| (-decay_rate * i as f64).exp()).collect()
}

/// A finished game seen from one team's side, with both box score lines
#[derive(Debug, Clone)]
pub struct TeamGameLine {
    pub team: TeamId,
    pub game: GameRecord,
    pub own: Option<BoxScoreRecord>,
    pub opponent: Option<BoxScoreRecord>,
}

impl TeamGameLine {
    pub fn date(&self) -> NaiveDate {
        self.game.date
    }

    pub fn is_home(&self) -> bool {
        self.game.home_team == self.team
    }

    pub fn points_for(&self) -> Option<f64> {
        self.game
            .score_for(self.team)
            .or_else(|| self.own.as_ref().map(|b| b.points))
            .map(f64::from)
    }

    pub fn points_against(&self) -> Option<f64> {
        self.game
            .score_against(self.team)
            .or_else(|| self.opponent.as_ref().map(|b| b.points))
            .map(f64::from)
    }

    pub fn won(&self) -> Option<bool> {
        self.game.did_win(self.team)
    }

    pub fn margin(&self) -> Option<f64> {
        self.game.margin_for(self.team).map(f64::from)
    }
}

/// Select up to `window` finished games for `team` with date < `as_of`,
/// most recent first, and attach both box score lines.
pub fn select_window<S: StatsStore + ?Sized>(
    store: &S,
    team: TeamId,
    window: usize,
    as_of: NaiveDate,
) -> Result<Vec<TeamGameLine>> {
    let mut games = store.get_team_games(team, as_of, window)?;
    // the store contract already guarantees this; the cutoff is re-checked here
    games.retain(|g| g.date < as_of && g.is_finished() && g.involves(team));
    games.sort_by(|a, b| b.date.cmp(&a.date));
    games.truncate(window);

    let mut lines = Vec::with_capacity(games.len());
    for game in games {
        let own = store.get_box_score(&game.game_id, team)?;
        let opponent = store.get_opponent_box_score(&game.game_id, team)?;
        lines.push(TeamGameLine {
            team,
            game,
            own,
            opponent,
        });
    }
    Ok(lines)
}

/// Weighted rolling aggregates over one window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollingStats {
    /// Games in the window
    pub games: usize,
    pub points: Option<f64>,
    pub points_allowed: Option<f64>,
    pub point_differential: Option<f64>,
    pub rebounds: Option<f64>,
    pub assists: Option<f64>,
    pub turnovers: Option<f64>,
    pub steals: Option<f64>,
    pub blocks: Option<f64>,
    /// Fractions in [0, 1], from weighted made/attempted totals
    pub fg_pct: Option<f64>,
    pub three_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    pub win_rate: Option<f64>,
}

/// Current run of results ending at the most recent game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streak {
    pub win_streak: u32,
    pub loss_streak: u32,
}

/// Computes decayed rolling statistics
pub struct RollingStatsEngine<'s, S: StatsStore + ?Sized> {
    store: &'s S,
    min_games: usize,
}

impl<'s, S: StatsStore + ?Sized> RollingStatsEngine<'s, S> {
    pub fn new(store: &'s S, min_games: usize) -> Self {
        RollingStatsEngine { store, min_games }
    }

    pub fn from_config(store: &'s S, config: &FeatureConfig) -> Self {
        Self::new(store, config.min_games)
    }

    pub fn store(&self) -> &'s S {
        self.store
    }

    pub fn min_games(&self) -> usize {
        self.min_games
    }

    /// Rolling statistics for `team` over its last `window` games before `as_of`
    pub fn rolling_stats(
        &self,
        team: TeamId,
        window: usize,
        as_of: NaiveDate,
        decay_rate: f64,
    ) -> Result<RollingStats> {
        let lines = select_window(self.store, team, window, as_of)?;
        log::debug!(
            "{}: {} games in window {} before {}",
            team,
            lines.len(),
            window,
            as_of
        );
        Ok(self.compute(&lines, decay_rate))
    }

    /// Aggregate an already selected window
    pub fn compute(&self, lines: &[TeamGameLine], decay_rate: f64) -> RollingStats {
        let weights = decay_weights(lines.len(), decay_rate);

        let mut points = WeightedTotal::new();
        let mut allowed = WeightedTotal::new();
        let mut diff = WeightedTotal::new();
        let mut rebounds = WeightedTotal::new();
        let mut assists = WeightedTotal::new();
        let mut turnovers = WeightedTotal::new();
        let mut steals = WeightedTotal::new();
        let mut blocks = WeightedTotal::new();
        let mut fg = WeightedRatio::new();
        let mut three = WeightedRatio::new();
        let mut ft = WeightedRatio::new();
        let mut wins = WeightedTotal::new();

        for (line, &w) in lines.iter().zip(&weights) {
            points.push(line.points_for(), w);
            allowed.push(line.points_against(), w);
            diff.push(line.margin(), w);
            wins.push(line.won().map(flag), w);

            if let Some(b) = &line.own {
                rebounds.push(b.rebounds().map(f64::from), w);
                assists.push(b.assists.map(f64::from), w);
                turnovers.push(b.turnovers.map(f64::from), w);
                steals.push(b.steals.map(f64::from), w);
                blocks.push(b.blocks.map(f64::from), w);
                fg.push(
                    Some(b.field_goals_made.into()),
                    Some(b.field_goals_attempted.into()),
                    w,
                );
                three.push(
                    Some(b.three_pointers_made.into()),
                    Some(b.three_pointers_attempted.into()),
                    w,
                );
                ft.push(
                    Some(b.free_throws_made.into()),
                    Some(b.free_throws_attempted.into()),
                    w,
                );
            }
        }

        let min = self.min_games;
        RollingStats {
            games: lines.len(),
            points: points.mean_with_min(min),
            points_allowed: allowed.mean_with_min(min),
            point_differential: diff.mean_with_min(min),
            rebounds: rebounds.mean_with_min(min),
            assists: assists.mean_with_min(min),
            turnovers: turnovers.mean_with_min(min),
            steals: steals.mean_with_min(min),
            blocks: blocks.mean_with_min(min),
            fg_pct: fg.ratio_with_min(min),
            three_pct: three.ratio_with_min(min),
            ft_pct: ft.ratio_with_min(min),
            win_rate: wins.mean_with_min(min),
        }
    }

    /// Weighted win rate over the home (or away) games of a window. Each
    /// game keeps the weight of its position in the full window.
    pub fn split_win_rate(&self, lines: &[TeamGameLine], decay_rate: f64, home: bool) -> Option<f64> {
        let weights = decay_weights(lines.len(), decay_rate);
        let wins: WeightedTotal = lines
            .iter()
            .zip(weights)
            .filter(|(line, _)| line.is_home() == home)
            .map(|(line, w)| (line.won().map(flag), w))
            .collect();
        wins.mean_with_min(self.min_games)
    }

    /// Consecutive wins or losses ending at the most recent game.
    /// `None` when the team has no finished games before the cutoff.
    pub fn streak(&self, team: TeamId, as_of: NaiveDate, lookback: usize) -> Result<Option<Streak>> {
        let lines = select_window(self.store, team, lookback, as_of)?;
        Ok(streak_of(&lines))
    }
}

/// Streak over a most-recent-first window
pub fn streak_of(lines: &[TeamGameLine]) -> Option<Streak> {
    let first = lines.first()?.won()?;
    let run = lines
        .iter()
        .take_while(|line| line.won() == Some(first))
        .count() as u32;
    Some(if first {
        Streak {
            win_streak: run,
            loss_streak: 0,
        }
    } else {
        Streak {
            win_streak: 0,
            loss_streak: run,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{box_line, day, League};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    /// Team 1 plays at home on days 1..=n; `scores[0]` is the most recent game.
    fn league_with_points(scores: &[u16]) -> League {
        let mut league = League::new();
        let n = scores.len() as i64;
        for (i, &pts) in scores.iter().enumerate() {
            league.finished(day(n - i as i64), 1, 2, pts, 100);
        }
        league
    }

    fn simple_mean(values: &[u16]) -> f64 {
        values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
    }

    #[test]
    fn test_decay_weights() {
        let w = decay_weights(5, 0.1);
        assert_relative_eq!(w[0], 1.0);
        assert_relative_eq!(w[1], 0.904837, epsilon = 1e-6);
        assert_relative_eq!(w[2], 0.818731, epsilon = 1e-6);
        assert_relative_eq!(w[3], 0.740818, epsilon = 1e-6);
        assert_relative_eq!(w[4], 0.670320, epsilon = 1e-6);
        assert!(decay_weights(4, 0.0).iter().all(|&x| x == 1.0));
    }

    #[test]
    fn test_zero_decay_is_simple_mean() {
        let scores = [101, 99, 130, 87, 112, 95];
        let league = league_with_points(&scores);
        let engine = RollingStatsEngine::new(&league.db, 3);
        let stats = engine.rolling_stats(TeamId(1), 10, day(30), 0.0).unwrap();
        assert_eq!(stats.games, 6);
        assert_relative_eq!(stats.points.unwrap(), simple_mean(&scores), epsilon = 1e-9);
    }

    #[test]
    fn test_recent_form_dominates_with_decay() {
        // improving toward the present
        let improving = [120, 118, 115, 108, 105];
        let league = league_with_points(&improving);
        let engine = RollingStatsEngine::new(&league.db, 3);
        let stats = engine.rolling_stats(TeamId(1), 5, day(30), 0.1).unwrap();
        let weighted = stats.points.unwrap();

        let w = decay_weights(5, 0.1);
        let expected = improving
            .iter()
            .zip(&w)
            .map(|(&p, w)| p as f64 * w)
            .sum::<f64>()
            / w.iter().sum::<f64>();
        assert_relative_eq!(weighted, expected, epsilon = 1e-9);
        assert!(weighted > simple_mean(&improving));

        let declining = [105, 108, 115, 118, 120];
        let league = league_with_points(&declining);
        let engine = RollingStatsEngine::new(&league.db, 3);
        let stats = engine.rolling_stats(TeamId(1), 5, day(30), 0.1).unwrap();
        assert!(stats.points.unwrap() < simple_mean(&declining));
    }

    #[test]
    fn test_fg_pct_from_weighted_totals() {
        let mut league = League::new();
        let attempts = [(50u16, 100u16), (10, 20), (30, 40)];
        for (i, &(made, att)) in attempts.iter().enumerate() {
            let id = league.finished(day(10 - i as i64), 1, 2, 100, 90);
            let mut line = box_line(&id, 1, true, 100);
            line.field_goals_made = made;
            line.field_goals_attempted = att;
            league.db.upsert_box_score(&line).unwrap();
        }
        let engine = RollingStatsEngine::new(&league.db, 3);
        let stats = engine.rolling_stats(TeamId(1), 10, day(30), 0.1).unwrap();

        let w = decay_weights(3, 0.1);
        let made: f64 = attempts.iter().zip(&w).map(|(a, w)| a.0 as f64 * w).sum();
        let att: f64 = attempts.iter().zip(&w).map(|(a, w)| a.1 as f64 * w).sum();
        assert_relative_eq!(stats.fg_pct.unwrap(), made / att, epsilon = 1e-12);

        let mean_of_pcts = attempts
            .iter()
            .zip(&w)
            .map(|(a, w)| a.0 as f64 / a.1 as f64 * w)
            .sum::<f64>()
            / w.iter().sum::<f64>();
        assert!((stats.fg_pct.unwrap() - mean_of_pcts).abs() > 1e-3);
    }

    #[test]
    fn test_insufficient_games_are_null() {
        let league = league_with_points(&[110, 100]);
        let engine = RollingStatsEngine::new(&league.db, 3);
        let stats = engine.rolling_stats(TeamId(1), 10, day(30), 0.1).unwrap();
        assert_eq!(stats.games, 2);
        assert!(stats.points.is_none());
        assert!(stats.fg_pct.is_none());
        assert!(stats.win_rate.is_none());
    }

    #[test]
    fn test_missing_counting_stat_is_skipped() {
        let mut league = League::new();
        for d in 1..=4 {
            let id = league.finished(day(d), 1, 2, 100, 90);
            if d == 4 {
                let mut line = box_line(&id, 1, true, 100);
                line.steals = None;
                league.db.upsert_box_score(&line).unwrap();
            }
        }
        let engine = RollingStatsEngine::new(&league.db, 4);
        let stats = engine.rolling_stats(TeamId(1), 10, day(30), 0.1).unwrap();
        assert!(stats.steals.is_none(), "only 3 games carry steals");
        assert_relative_eq!(stats.blocks.unwrap(), 5.0);
    }

    #[test]
    fn test_win_rate_streak_and_splits() {
        let mut league = League::new();
        // oldest first: L (away), W (home), W (away), W (home)
        league.finished(day(1), 2, 1, 110, 100);
        league.finished(day(2), 1, 2, 110, 100);
        league.finished(day(3), 2, 1, 90, 100);
        league.finished(day(4), 1, 3, 105, 100);

        let engine = RollingStatsEngine::new(&league.db, 2);
        let stats = engine.rolling_stats(TeamId(1), 10, day(10), 0.0).unwrap();
        assert_relative_eq!(stats.win_rate.unwrap(), 0.75);

        let streak = engine.streak(TeamId(1), day(10), 20).unwrap().unwrap();
        assert_eq!(streak, Streak { win_streak: 3, loss_streak: 0 });
        let streak = engine.streak(TeamId(1), day(2), 20).unwrap().unwrap();
        assert_eq!(streak, Streak { win_streak: 0, loss_streak: 1 });
        assert!(engine.streak(TeamId(1), day(1), 20).unwrap().is_none());

        let lines = select_window(&league.db, TeamId(1), 10, day(10)).unwrap();
        assert_relative_eq!(engine.split_win_rate(&lines, 0.0, true).unwrap(), 1.0);
        assert_relative_eq!(engine.split_win_rate(&lines, 0.0, false).unwrap(), 0.5);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_no_game_on_or_after_cutoff(
            games in prop::collection::vec((0i64..60, 80u16..140, any::<bool>()), 1..25),
            cutoff in 0i64..70,
            window in 1usize..20,
        ) {
            let mut league = League::new();
            for (d, pts, home) in &games {
                if *home {
                    league.finished(day(*d), 1, 2, *pts, 100);
                } else {
                    league.finished(day(*d), 2, 1, 100, *pts);
                }
            }
            let as_of = day(cutoff);
            let lines = select_window(&league.db, TeamId(1), window, as_of).unwrap();
            prop_assert!(lines.len() <= window);
            prop_assert!(lines.iter().all(|l| l.date() < as_of));
            prop_assert!(lines.windows(2).all(|p| p[0].date() >= p[1].date()));

            // adding games on or after the cutoff must not change anything
            let engine = RollingStatsEngine::new(&league.db, 3);
            let before = engine.rolling_stats(TeamId(1), window, as_of, 0.1).unwrap();
            league.finished(as_of, 1, 3, 200, 50);
            league.finished(as_of + chrono::Duration::days(1), 3, 1, 50, 200);
            let engine = RollingStatsEngine::new(&league.db, 3);
            let after = engine.rolling_stats(TeamId(1), window, as_of, 0.1).unwrap();
            prop_assert_eq!(before, after);
        }

        #[test]
        fn prop_zero_decay_is_simple_mean(
            scores in prop::collection::vec(60u16..160, 1..25),
            window in 1usize..30,
        ) {
            let league = league_with_points(&scores);
            let engine = RollingStatsEngine::new(&league.db, 3);
            let stats = engine.rolling_stats(TeamId(1), window, day(40), 0.0).unwrap();

            let taken = &scores[..window.min(scores.len())];
            prop_assert_eq!(stats.games, taken.len());
            match stats.points {
                Some(points) => {
                    prop_assert!(taken.len() >= 3);
                    prop_assert!((points - simple_mean(taken)).abs() < 1e-9);
                }
                None => prop_assert!(taken.len() < 3),
            }
        }
    }
}
