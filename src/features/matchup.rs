//! Head-to-head history and relative team differentials

use crate::data::StatsStore;
use crate::features::advanced::{AdvancedMetrics, AdvancedMetricsEngine};
use crate::features::injury::InjuryImpact;
use crate::features::nullable::{NullableExt, WeightedTotal};
use crate::features::rolling::RollingStatsEngine;
use crate::{Result, TeamId};
use chrono::NaiveDate;

/// Previous meetings, from `team_a`'s point of view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadToHead {
    pub games: usize,
    pub team_a_wins: usize,
    pub team_b_wins: usize,
    pub avg_point_differential: Option<f64>,
    pub team_a_avg_score: Option<f64>,
    pub team_b_avg_score: Option<f64>,
}

/// Style differentials, `a − b`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleMatchup {
    pub pace_differential: Option<f64>,
    pub ts_differential: Option<f64>,
    pub efg_differential: Option<f64>,
}

impl StyleMatchup {
    pub fn between(a: &AdvancedMetrics, b: &AdvancedMetrics) -> Self {
        StyleMatchup {
            pace_differential: a.pace.minus(b.pace),
            ts_differential: a.true_shooting_pct.minus(b.true_shooting_pct),
            efg_differential: a.effective_fg_pct.minus(b.effective_fg_pct),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecentForm {
    pub team_a_win_pct: Option<f64>,
    pub team_b_win_pct: Option<f64>,
    pub win_pct_differential: Option<f64>,
}

impl RecentForm {
    pub fn between(a: Option<f64>, b: Option<f64>) -> Self {
        RecentForm {
            team_a_win_pct: a,
            team_b_win_pct: b,
            win_pct_differential: a.minus(b),
        }
    }
}

/// Injury differentials, `away − home`: positive favours the home side
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InjuryMatchup {
    pub injury_advantage: Option<f64>,
    pub key_player_advantage: Option<f64>,
    pub importance_advantage: Option<f64>,
}

impl InjuryMatchup {
    pub fn between(home: &InjuryImpact, away: &InjuryImpact) -> Self {
        let key_out = |i: &InjuryImpact| i.key_players_out_count.map(|n| n as f64);
        InjuryMatchup {
            injury_advantage: away.weighted_injury_score.minus(home.weighted_injury_score),
            key_player_advantage: key_out(away).minus(key_out(home)),
            importance_advantage: away.total_importance_out.minus(home.total_importance_out),
        }
    }
}

/// Compares two teams as of a cutoff
pub struct MatchupEngine<'s, S: StatsStore + ?Sized> {
    store: &'s S,
    min_games: usize,
}

impl<'s, S: StatsStore + ?Sized> MatchupEngine<'s, S> {
    pub fn new(store: &'s S, min_games: usize) -> Self {
        MatchupEngine { store, min_games }
    }

    /// Last `n` meetings before `as_of`
    pub fn head_to_head(
        &self,
        team_a: TeamId,
        team_b: TeamId,
        n: usize,
        as_of: NaiveDate,
    ) -> Result<HeadToHead> {
        let meetings: Vec<_> = self
            .store
            .get_head_to_head(team_a, team_b, as_of, n)?
            .into_iter()
            .filter(|g| g.date < as_of && g.is_finished())
            .take(n)
            .collect();

        let mut h2h = HeadToHead {
            games: meetings.len(),
            ..HeadToHead::default()
        };
        let mut diff = WeightedTotal::new();
        let mut a_score = WeightedTotal::new();
        let mut b_score = WeightedTotal::new();
        for game in &meetings {
            match game.did_win(team_a) {
                Some(true) => h2h.team_a_wins += 1,
                Some(false) => h2h.team_b_wins += 1,
                None => {}
            }
            diff.push(game.margin_for(team_a).map(f64::from), 1.0);
            a_score.push(game.score_for(team_a).map(f64::from), 1.0);
            b_score.push(game.score_for(team_b).map(f64::from), 1.0);
        }
        h2h.avg_point_differential = diff.mean();
        h2h.team_a_avg_score = a_score.mean();
        h2h.team_b_avg_score = b_score.mean();
        Ok(h2h)
    }

    /// Pace, true shooting and effective FG differentials
    pub fn style_matchup(
        &self,
        team_a: TeamId,
        team_b: TeamId,
        window: usize,
        as_of: NaiveDate,
        decay_rate: f64,
    ) -> Result<StyleMatchup> {
        let engine = AdvancedMetricsEngine::new(self.store, self.min_games);
        let a = engine.advanced_metrics(team_a, window, as_of, decay_rate)?;
        let b = engine.advanced_metrics(team_b, window, as_of, decay_rate)?;
        Ok(StyleMatchup::between(&a, &b))
    }

    pub fn recent_form(
        &self,
        team_a: TeamId,
        team_b: TeamId,
        window: usize,
        as_of: NaiveDate,
        decay_rate: f64,
    ) -> Result<RecentForm> {
        let engine = RollingStatsEngine::new(self.store, self.min_games);
        let a = engine.rolling_stats(team_a, window, as_of, decay_rate)?;
        let b = engine.rolling_stats(team_b, window, as_of, decay_rate)?;
        Ok(RecentForm::between(a.win_rate, b.win_rate))
    }
}
