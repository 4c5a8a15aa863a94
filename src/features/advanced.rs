//! Possession-based team metrics
//!
//! Ratings and rates are per 100 possessions. Ratios are always taken from
//! weighted totals over the same window and decay as the rolling stats.

use crate::data::StatsStore;
use crate::features::nullable::{NullableExt, WeightedRatio, WeightedTotal};
use crate::features::rolling::{decay_weights, select_window, TeamGameLine};
use crate::{BoxScoreRecord, Result, TeamId};
use chrono::NaiveDate;

/// Estimated possessions: `max(0, FGA - ORB + TOV + 0.44·FTA)`.
/// `None` when offensive rebounds or turnovers were not recorded.
pub fn possessions(line: &BoxScoreRecord) -> Option<f64> {
    let orb = f64::from(line.offensive_rebounds?);
    let tov = f64::from(line.turnovers?);
    let fga = f64::from(line.field_goals_attempted);
    let fta = f64::from(line.free_throws_attempted);
    Some((fga - orb + tov + 0.44 * fta).max(0.0))
}

/// Possession-normalised metrics over one window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvancedMetrics {
    pub games: usize,
    /// Weighted possessions per game
    pub pace: Option<f64>,
    pub offensive_rating: Option<f64>,
    pub defensive_rating: Option<f64>,
    pub net_rating: Option<f64>,
    pub true_shooting_pct: Option<f64>,
    pub effective_fg_pct: Option<f64>,
    /// Per 100 possessions
    pub rebound_rate: Option<f64>,
    pub assist_rate: Option<f64>,
    pub steal_rate: Option<f64>,
    pub block_rate: Option<f64>,
    pub turnover_rate: Option<f64>,
    /// Share of available rebounds, ×100
    pub offensive_rebound_pct: Option<f64>,
    pub defensive_rebound_pct: Option<f64>,
}

/// Computes possession-based metrics on top of the rolling game selection
pub struct AdvancedMetricsEngine<'s, S: StatsStore + ?Sized> {
    store: &'s S,
    min_games: usize,
}

impl<'s, S: StatsStore + ?Sized> AdvancedMetricsEngine<'s, S> {
    pub fn new(store: &'s S, min_games: usize) -> Self {
        AdvancedMetricsEngine { store, min_games }
    }

    pub fn advanced_metrics(
        &self,
        team: TeamId,
        window: usize,
        as_of: NaiveDate,
        decay_rate: f64,
    ) -> Result<AdvancedMetrics> {
        let lines = select_window(self.store, team, window, as_of)?;
        Ok(self.compute(&lines, decay_rate))
    }

    pub fn compute(&self, lines: &[TeamGameLine], decay_rate: f64) -> AdvancedMetrics {
        let weights = decay_weights(lines.len(), decay_rate);
        let min = self.min_games;

        let mut pace = WeightedTotal::new();
        let mut offense = WeightedRatio::new();
        let mut defense = WeightedRatio::new();
        let mut true_shooting = WeightedRatio::new();
        let mut effective_fg = WeightedRatio::new();
        let mut rebounds = WeightedRatio::new();
        let mut assists = WeightedRatio::new();
        let mut steals = WeightedRatio::new();
        let mut blocks = WeightedRatio::new();
        let mut turnovers = WeightedRatio::new();
        let mut orb_share = WeightedRatio::new();
        let mut drb_share = WeightedRatio::new();

        for (line, &w) in lines.iter().zip(&weights) {
            if let Some(own) = &line.own {
                let poss = possessions(own);
                pace.push(poss, w);
                offense.push(Some(own.points.into()), poss, w);

                let fga = f64::from(own.field_goals_attempted);
                let fta = f64::from(own.free_throws_attempted);
                true_shooting.push(Some(own.points.into()), Some(2.0 * (fga + 0.44 * fta)), w);
                effective_fg.push(
                    Some(
                        f64::from(own.field_goals_made)
                            + 0.5 * f64::from(own.three_pointers_made),
                    ),
                    Some(fga),
                    w,
                );

                rebounds.push(own.rebounds().map(f64::from), poss, w);
                assists.push(own.assists.map(f64::from), poss, w);
                steals.push(own.steals.map(f64::from), poss, w);
                blocks.push(own.blocks.map(f64::from), poss, w);
                turnovers.push(own.turnovers.map(f64::from), poss, w);

                if let Some(opp) = &line.opponent {
                    let orb = own.offensive_rebounds.map(f64::from);
                    let drb = own.defensive_rebounds.map(f64::from);
                    let opp_orb = opp.offensive_rebounds.map(f64::from);
                    let opp_drb = opp.defensive_rebounds.map(f64::from);
                    orb_share.push(orb, orb.plus(opp_drb), w);
                    drb_share.push(drb, drb.plus(opp_orb), w);
                }
            }

            if let Some(opp) = &line.opponent {
                defense.push(Some(opp.points.into()), possessions(opp), w);
            }
        }

        let per_100 = |r: &WeightedRatio| r.ratio_with_min(min).scaled(100.0);
        let offensive_rating = per_100(&offense);
        let defensive_rating = per_100(&defense);

        AdvancedMetrics {
            games: lines.len(),
            pace: pace.mean_with_min(min),
            offensive_rating,
            defensive_rating,
            net_rating: offensive_rating.minus(defensive_rating),
            true_shooting_pct: per_100(&true_shooting),
            effective_fg_pct: per_100(&effective_fg),
            rebound_rate: per_100(&rebounds),
            assist_rate: per_100(&assists),
            steal_rate: per_100(&steals),
            block_rate: per_100(&blocks),
            turnover_rate: per_100(&turnovers),
            offensive_rebound_pct: per_100(&orb_share),
            defensive_rebound_pct: per_100(&drb_share),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{box_line, day, League};
    use crate::GameId;
    use approx::assert_relative_eq;

    #[test]
    fn test_possessions() {
        let line = box_line(&GameId::new("g"), 1, true, 100);
        // 88 - 10 + 13 + 0.44 * 22
        assert_relative_eq!(possessions(&line).unwrap(), 100.68, epsilon = 1e-9);

        let mut line = line;
        line.turnovers = None;
        assert!(possessions(&line).is_none());

        let mut tiny = box_line(&GameId::new("g"), 1, true, 0);
        tiny.field_goals_attempted = 0;
        tiny.free_throws_attempted = 0;
        tiny.turnovers = Some(0);
        assert_eq!(possessions(&tiny), Some(0.0));
    }

    #[test]
    fn test_ratings_use_opponent_box_score() {
        let mut league = League::new();
        league.finished(day(1), 1, 2, 110, 100);
        league.finished(day(2), 2, 1, 95, 105);
        league.finished(day(3), 1, 3, 120, 99);

        let engine = AdvancedMetricsEngine::new(&league.db, 3);
        let m = engine.advanced_metrics(TeamId(1), 10, day(10), 0.0).unwrap();
        assert_eq!(m.games, 3);

        // every standard line has 100.68 possessions
        assert_relative_eq!(m.pace.unwrap(), 100.68, epsilon = 1e-9);
        let ortg = (110.0 + 105.0 + 120.0) / (3.0 * 100.68) * 100.0;
        let drtg = (100.0 + 95.0 + 99.0) / (3.0 * 100.68) * 100.0;
        assert_relative_eq!(m.offensive_rating.unwrap(), ortg, epsilon = 1e-9);
        assert_relative_eq!(m.defensive_rating.unwrap(), drtg, epsilon = 1e-9);
        assert_relative_eq!(m.net_rating.unwrap(), ortg - drtg, epsilon = 1e-9);

        // (40 + 6) / 88
        assert_relative_eq!(m.effective_fg_pct.unwrap(), 46.0 / 88.0 * 100.0, epsilon = 1e-9);
        assert_relative_eq!(m.assist_rate.unwrap(), 25.0 / 100.68 * 100.0, epsilon = 1e-9);
        // 10 / (10 + 34)
        assert_relative_eq!(
            m.offensive_rebound_pct.unwrap(),
            10.0 / 44.0 * 100.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_true_shooting_weighted_totals() {
        let mut league = League::new();
        league.finished(day(1), 1, 2, 100, 90);
        league.finished(day(2), 1, 2, 120, 90);
        league.finished(day(3), 1, 2, 80, 90);

        let engine = AdvancedMetricsEngine::new(&league.db, 3);
        let m = engine.advanced_metrics(TeamId(1), 10, day(10), 0.1).unwrap();
        let w = decay_weights(3, 0.1);
        // most recent first: 80, 120, 100
        let pts = 80.0 * w[0] + 120.0 * w[1] + 100.0 * w[2];
        let tsa = 2.0 * (88.0 + 0.44 * 22.0) * w.iter().sum::<f64>();
        assert_relative_eq!(m.true_shooting_pct.unwrap(), pts / tsa * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_opponent_leaves_defense_null() {
        let mut league = League::new();
        for d in 1..=3 {
            league.finished(day(d), 1, 2, 100, 90);
        }
        let mut lines = select_window(&league.db, TeamId(1), 10, day(10)).unwrap();
        for line in &mut lines {
            line.opponent = None;
        }
        let engine = AdvancedMetricsEngine::new(&league.db, 3);
        let m = engine.compute(&lines, 0.1);
        assert!(m.offensive_rating.is_some());
        assert!(m.defensive_rating.is_none());
        assert!(m.net_rating.is_none());
        assert!(m.defensive_rebound_pct.is_none());
    }

    #[test]
    fn test_empty_window_is_all_null() {
        let league = League::new();
        let engine = AdvancedMetricsEngine::new(&league.db, 3);
        let m = engine.advanced_metrics(TeamId(1), 10, day(10), 0.1).unwrap();
        assert_eq!(m, AdvancedMetrics::default());
    }
}
