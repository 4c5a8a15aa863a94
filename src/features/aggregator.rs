//! Feature vector assembly
//!
//! [`FeatureAggregator`] resolves one cutoff date per game and threads it
//! through every engine, so a vector only ever sees games played strictly
//! before that date. Results go through the schema builder and are cached
//! per `(game_id, schema_version)`.

use crate::data::{FeatureCache, StatsStore};
use crate::features::advanced::{AdvancedMetrics, AdvancedMetricsEngine};
use crate::features::contextual::{ContextualEngine, TeamContext};
use crate::features::importance::PlayerImportanceScorer;
use crate::features::injury::{
    HistoricalInjuryImpact, InjuryImpact, InjuryImpactEngine, RealtimeInjuries,
};
use crate::features::market::market_features;
use crate::features::matchup::{InjuryMatchup, MatchupEngine, RecentForm, StyleMatchup};
use crate::features::rolling::{select_window, RollingStats, RollingStatsEngine, Streak};
use crate::features::schema::{
    is_detailed_window, FeatureSchema, FeatureVector, FeatureVectorBuilder, Side,
};
use crate::{Config, GameId, GameRecord, GameStatus, HoopsError, Result, SeasonType, TeamId};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Games scanned back when measuring the current streak
const STREAK_LOOKBACK: usize = 82;

/// Per-call options for [`FeatureAggregator::create_feature_vector`]
#[derive(Debug, Clone)]
pub struct VectorOptions {
    /// Cutoff date; defaults to the game's own date
    pub as_of: Option<NaiveDate>,
    /// Window for the headline team metrics; defaults to `features.default_window`
    pub window: Option<usize>,
    pub use_cache: bool,
}

impl Default for VectorOptions {
    fn default() -> Self {
        VectorOptions {
            as_of: None,
            window: None,
            use_cache: true,
        }
    }
}

/// Everything computed for one side of a game
struct SideFeatures {
    stats: RollingStats,
    advanced: AdvancedMetrics,
    streak: Option<Streak>,
    home_split: Option<f64>,
    away_split: Option<f64>,
    windows: Vec<(usize, RollingStats)>,
    injury: InjuryImpact,
    historical: HistoricalInjuryImpact,
}

/// Builds feature vectors for games.
///
/// Holds the importance memo and the real-time injury overrides for its
/// lifetime. Concurrent workers each get their own aggregator.
pub struct FeatureAggregator<'s, S: StatsStore + FeatureCache + ?Sized> {
    store: &'s S,
    config: Config,
    schema: FeatureSchema,
    scorer: PlayerImportanceScorer<'s, S>,
    realtime: HashMap<TeamId, RealtimeInjuries>,
}

impl<'s, S: StatsStore + FeatureCache + ?Sized> FeatureAggregator<'s, S> {
    pub fn new(store: &'s S, config: Config) -> Self {
        let schema = FeatureSchema::from_config(&config.features);
        let scorer = PlayerImportanceScorer::new(store, config.features.min_games);
        FeatureAggregator {
            store,
            config,
            schema,
            scorer,
            realtime: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the real-time injury reports used by subsequent vectors
    pub fn set_realtime_injuries(&mut self, injuries: HashMap<TeamId, RealtimeInjuries>) {
        log::info!("Using real-time injury reports for {} teams", injuries.len());
        self.realtime = injuries;
    }

    pub fn clear_realtime_injuries(&mut self) {
        self.realtime.clear();
    }

    pub fn realtime_injuries_for(&self, team: TeamId) -> Option<&RealtimeInjuries> {
        self.realtime.get(&team)
    }

    fn has_realtime_injuries(&self, team: TeamId) -> bool {
        self.realtime_injuries_for(team).is_some_and(|r| !r.is_empty())
    }

    /// Feature vector for `game_id` with `home` hosting `away`.
    ///
    /// A cached vector is returned as stored when `use_cache` is set. A
    /// freshly computed vector is written back when caching is enabled,
    /// unless a real-time injury report was applied to either team.
    pub fn create_feature_vector(
        &mut self,
        game_id: &GameId,
        home: TeamId,
        away: TeamId,
        options: &VectorOptions,
    ) -> Result<FeatureVector> {
        let stored_game = self.store.get_game(game_id)?;
        let as_of = match (options.as_of, &stored_game) {
            (Some(date), _) => date,
            (None, Some(game)) => game.date,
            (None, None) => return Err(HoopsError::GameNotFound(game_id.clone())),
        };

        if options.use_cache {
            if let Some(vector) = self.load_cached(game_id)? {
                log::debug!("Feature cache hit for {}", game_id);
                return Ok(vector);
            }
        }

        let game = match stored_game {
            Some(g) => {
                if g.home_team != home || g.away_team != away {
                    log::warn!(
                        "{}: stored teams {} vs {} differ from requested {} vs {}",
                        game_id,
                        g.home_team,
                        g.away_team,
                        home,
                        away
                    );
                }
                GameRecord {
                    home_team: home,
                    away_team: away,
                    ..g
                }
            }
            None => GameRecord {
                game_id: game_id.clone(),
                season: String::new(),
                season_type: SeasonType::Regular,
                date: as_of,
                home_team: home,
                away_team: away,
                home_score: None,
                away_score: None,
                status: GameStatus::Scheduled,
            },
        };

        let window = options
            .window
            .unwrap_or(self.config.features.default_window);
        let vector = self.compute(&game, as_of, window)?;

        if !self.config.features.cache_enabled {
            return Ok(vector);
        }
        if self.has_realtime_injuries(home) || self.has_realtime_injuries(away) {
            log::debug!("{}: not caching a vector built from real-time injuries", game_id);
        } else {
            self.store.save_features(
                game_id,
                self.schema.cache_version(),
                &vector.to_stored(home, away),
            )?;
        }
        Ok(vector)
    }

    /// Cached vector for `game_id`, if one exists under the current schema
    fn load_cached(&self, game_id: &GameId) -> Result<Option<FeatureVector>> {
        let stored = self.store.load_features(game_id, self.schema.cache_version())?;
        if stored.is_empty() {
            return Ok(None);
        }
        match self.schema.vector_from_stored(game_id.clone(), &stored) {
            Ok(vector) => Ok(Some(vector)),
            Err(HoopsError::SchemaMismatch { detail, .. }) => {
                log::warn!("Ignoring stale cached features for {}: {}", game_id, detail);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn compute(&mut self, game: &GameRecord, as_of: NaiveDate, window: usize) -> Result<FeatureVector> {
        log::debug!(
            "Computing features for {} ({} vs {}) as of {}",
            game.game_id,
            game.home_team,
            game.away_team,
            as_of
        );

        let home = self.side_features(game.home_team, as_of, window)?;
        let away = self.side_features(game.away_team, as_of, window)?;

        let store = self.store;
        let f = &self.config.features;
        let h2h = MatchupEngine::new(store, f.min_games).head_to_head(
            game.home_team,
            game.away_team,
            f.h2h_games,
            as_of,
        )?;
        let context = ContextualEngine::new(store).game_context(game, as_of)?;
        let market = market_features(store, &game.game_id)?;

        let mut b = self.schema.builder(game.game_id.clone());
        write_side(&mut b, Side::Home, &home, &context.home)?;
        write_side(&mut b, Side::Away, &away, &context.away)?;

        b.set_count("h2h_home_wins", Some(h2h.team_a_wins))?;
        b.set_count("h2h_away_wins", Some(h2h.team_b_wins))?;
        b.set_count("h2h_total_games", Some(h2h.games))?;
        b.set("h2h_avg_point_differential", h2h.avg_point_differential)?;
        b.set("h2h_home_avg_score", h2h.team_a_avg_score)?;
        b.set("h2h_away_avg_score", h2h.team_b_avg_score)?;

        let style = StyleMatchup::between(&home.advanced, &away.advanced);
        b.set("pace_differential", style.pace_differential)?;
        b.set("ts_differential", style.ts_differential)?;
        b.set("efg_differential", style.efg_differential)?;

        let form = RecentForm::between(home.stats.win_rate, away.stats.win_rate);
        b.set("win_pct_differential", form.win_pct_differential)?;

        let injuries = InjuryMatchup::between(&home.injury, &away.injury);
        b.set("injury_advantage", injuries.injury_advantage)?;
        b.set("key_player_advantage", injuries.key_player_advantage)?;
        b.set("importance_advantage", injuries.importance_advantage)?;

        b.set("rest_days_differential", context.rest_differential)?;
        b.set_flag("same_conference", context.same_conference)?;
        b.set_flag("same_division", context.same_division)?;
        b.set_flag("is_playoffs", Some(context.is_playoffs))?;

        b.set("consensus_spread", market.consensus_spread)?;
        b.set("consensus_total", market.consensus_total)?;
        b.set("home_moneyline_prob", market.home_moneyline_prob)?;
        b.set("away_moneyline_prob", market.away_moneyline_prob)?;

        let vector = b.finish()?;
        log::debug!(
            "{}: {} features, {} null",
            game.game_id,
            vector.len(),
            vector.null_count()
        );
        Ok(vector)
    }

    fn side_features(&mut self, team: TeamId, as_of: NaiveDate, window: usize) -> Result<SideFeatures> {
        let store = self.store;
        let f = &self.config.features;
        let rolling = RollingStatsEngine::from_config(store, f);
        let advanced = AdvancedMetricsEngine::new(store, f.min_games);

        let lines = select_window(store, team, window, as_of)?;
        let stats = rolling.compute(&lines, f.decay_rate);
        let advanced = advanced.compute(&lines, f.decay_rate);
        let home_split = rolling.split_win_rate(&lines, f.decay_rate, true);
        let away_split = rolling.split_win_rate(&lines, f.decay_rate, false);
        let streak = rolling.streak(team, as_of, STREAK_LOOKBACK)?;

        let mut windows = Vec::with_capacity(self.schema.windows().len());
        for &w in self.schema.windows() {
            windows.push((w, rolling.rolling_stats(team, w, as_of, f.decay_rate)?));
        }

        let engine = InjuryImpactEngine::new(store, &self.config);
        let overrides = self.realtime.get(&team);
        let injury = engine.injury_impact(&mut self.scorer, team, as_of, true, overrides)?;
        let historical = engine.historical_injury_impact(
            &mut self.scorer,
            team,
            as_of,
            self.config.features.historical_games_back,
        )?;

        Ok(SideFeatures {
            stats,
            advanced,
            streak,
            home_split,
            away_split,
            windows,
            injury,
            historical,
        })
    }
}

fn write_side(
    b: &mut FeatureVectorBuilder,
    side: Side,
    s: &SideFeatures,
    context: &TeamContext,
) -> Result<()> {
    let p = side.prefix();
    let name = |n: &str| format!("{}{}", p, n);

    let adv = &s.advanced;
    b.set(&name("offensive_rating"), adv.offensive_rating)?;
    b.set(&name("defensive_rating"), adv.defensive_rating)?;
    b.set(&name("net_rating"), adv.net_rating)?;
    b.set(&name("pace"), adv.pace)?;
    b.set(&name("true_shooting_pct"), adv.true_shooting_pct)?;
    b.set(&name("effective_fg_pct"), adv.effective_fg_pct)?;
    b.set(&name("rebound_rate"), adv.rebound_rate)?;
    b.set(&name("offensive_rebound_pct"), adv.offensive_rebound_pct)?;
    b.set(&name("defensive_rebound_pct"), adv.defensive_rebound_pct)?;
    b.set(&name("assist_rate"), adv.assist_rate)?;
    b.set(&name("steal_rate"), adv.steal_rate)?;
    b.set(&name("block_rate"), adv.block_rate)?;
    b.set(&name("turnover_rate"), adv.turnover_rate)?;

    b.set(&name("win_pct"), s.stats.win_rate)?;
    b.set(&name("avg_point_differential"), s.stats.point_differential)?;
    b.set(&name("avg_points_for"), s.stats.points)?;
    b.set(&name("avg_points_against"), s.stats.points_allowed)?;
    b.set(&name("win_streak"), s.streak.map(|st| f64::from(st.win_streak)))?;
    b.set(&name("loss_streak"), s.streak.map(|st| f64::from(st.loss_streak)))?;
    b.set(&name("home_split_win_pct"), s.home_split)?;
    b.set(&name("away_split_win_pct"), s.away_split)?;

    for (w, stats) in &s.windows {
        let l = |n: &str| name(&format!("l{}_{}", w, n));
        b.set(&l("points"), stats.points)?;
        b.set(&l("points_allowed"), stats.points_allowed)?;
        b.set(&l("fg_pct"), stats.fg_pct)?;
        b.set(&l("three_pct"), stats.three_pct)?;
        b.set(&l("win_pct"), stats.win_rate)?;
        if is_detailed_window(*w) {
            b.set(&l("ft_pct"), stats.ft_pct)?;
            b.set(&l("rebounds"), stats.rebounds)?;
            b.set(&l("assists"), stats.assists)?;
            b.set(&l("turnovers"), stats.turnovers)?;
            b.set(&l("steals"), stats.steals)?;
            b.set(&l("blocks"), stats.blocks)?;
        }
    }

    let inj = &s.injury;
    b.set_count(&name("players_out"), inj.players_out)?;
    b.set_count(&name("players_questionable"), inj.players_questionable)?;
    b.set(&name("injury_severity_score"), inj.naive_severity)?;
    b.set(&name("weighted_injury_score"), inj.weighted_injury_score)?;
    b.set(&name("weighted_severity_score"), inj.weighted_severity)?;
    b.set_flag(&name("key_player_out"), inj.key_player_out)?;
    b.set_count(&name("key_players_out_count"), inj.key_players_out_count)?;
    b.set(&name("total_importance_out"), inj.total_importance_out)?;
    b.set(&name("injury_win_pct_delta"), s.historical.win_pct_delta)?;
    b.set(&name("injury_point_diff_delta"), s.historical.point_diff_delta)?;

    b.set(&name("rest_days"), context.rest_days.map(|d| d as f64))?;
    b.set_flag(&name("is_b2b"), context.is_back_to_back)?;
    b.set(&name("days_until_next"), context.days_until_next.map(|d| d as f64))?;
    b.set_count(&name("games_last_7_days"), Some(context.games_last_7_days))?;
    Ok(())
}
