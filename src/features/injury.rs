//! Injury impact features
//!
//! Team availability is read from the most recent finished game's player
//! lines, optionally overridden by a real-time report. Absences are then
//! weighted by player importance so that losing a star counts for more than
//! losing a reserve.

use crate::data::StatsStore;
use crate::features::importance::PlayerImportanceScorer;
use crate::features::nullable::{flag, safe_div, NullableExt, WeightedTotal};
use crate::{Config, HoopsError, InjuryStatus, InjuryWeights, PlayerId, Result, Team, TeamId};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Real-time report for one team: player name as published → status
pub type RealtimeInjuries = BTreeMap<String, InjuryStatus>;

/// Lowercase, trimmed, with "Last, First" turned into "first last"
fn canonical_name(name: &str) -> String {
    let name = name.trim().to_lowercase();
    match name.split_once(',') {
        Some((last, first)) => format!("{} {}", first.trim(), last.trim()),
        None => name.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// Loose player-name comparison used for real-time reports.
///
/// Case-insensitive, accepts "Last, First", and accepts one name contained
/// in the other ("Nikola Jokic" vs "Jokic"). Empty names never match.
pub fn fuzzy_name_match(a: &str, b: &str) -> bool {
    let a = canonical_name(a);
    let b = canonical_name(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

/// Status for `player_name` from a report. An exact canonical match wins
/// over a containment match.
pub fn override_status(overrides: &RealtimeInjuries, player_name: &str) -> Option<InjuryStatus> {
    let wanted = canonical_name(player_name);
    if wanted.is_empty() {
        return None;
    }
    overrides
        .iter()
        .find(|(name, _)| canonical_name(name) == wanted)
        .or_else(|| {
            overrides
                .iter()
                .find(|(name, _)| fuzzy_name_match(name, player_name))
        })
        .map(|(_, status)| *status)
}

/// One rostered player with resolved status and importance
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub player_id: PlayerId,
    pub player_name: String,
    pub status: InjuryStatus,
    pub importance: Option<f64>,
}

/// Team injury features. Either fully computed or entirely null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InjuryImpact {
    pub total_players: Option<usize>,
    pub players_out: Option<usize>,
    pub players_questionable: Option<usize>,
    pub naive_severity: Option<f64>,
    pub weighted_injury_score: Option<f64>,
    pub weighted_severity: Option<f64>,
    pub key_player_out: Option<bool>,
    pub key_players_out_count: Option<usize>,
    pub total_importance_out: Option<f64>,
}

impl InjuryImpact {
    /// The record returned when there is no roster to look at
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }
}

/// Team results with and without its key players available
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalInjuryImpact {
    pub games_with: Option<usize>,
    pub games_without: Option<usize>,
    pub win_pct_with: Option<f64>,
    pub win_pct_without: Option<f64>,
    pub point_diff_with: Option<f64>,
    pub point_diff_without: Option<f64>,
    /// without − with; negative means the team is worse shorthanded
    pub win_pct_delta: Option<f64>,
    pub point_diff_delta: Option<f64>,
}

/// Computes injury features for a team as of a cutoff date
pub struct InjuryImpactEngine<'s, S: StatsStore + ?Sized> {
    store: &'s S,
    weights: InjuryWeights,
    top_players: usize,
    importance_games_back: usize,
    historical_min_games: usize,
    key_player_min_minutes: f64,
}

impl<'s, S: StatsStore + ?Sized> InjuryImpactEngine<'s, S> {
    pub fn new(store: &'s S, config: &Config) -> Self {
        InjuryImpactEngine {
            store,
            weights: config.injury_weights,
            top_players: config.features.top_players_count,
            importance_games_back: config.features.importance_games_back,
            historical_min_games: config.features.historical_min_games,
            key_player_min_minutes: config.features.key_player_min_minutes,
        }
    }

    /// Roster and statuses from the last finished game before `as_of`.
    /// A matching real-time report entry replaces the recorded status.
    pub fn roster(
        &self,
        team: TeamId,
        as_of: NaiveDate,
        overrides: Option<&RealtimeInjuries>,
    ) -> Result<Vec<RosterEntry>> {
        let last = match self.store.get_team_games(team, as_of, 1)?.into_iter().next() {
            Some(g) if g.date < as_of => g,
            _ => return Ok(Vec::new()),
        };

        let lines = self.store.get_player_box_scores(&last.game_id, team)?;
        let mut matched = 0;
        let roster: Vec<RosterEntry> = lines
            .into_iter()
            .map(|line| {
                let status = match overrides.and_then(|o| override_status(o, &line.player_name)) {
                    Some(status) => {
                        matched += 1;
                        status
                    }
                    None => line.injury_status,
                };
                RosterEntry {
                    player_id: line.player_id,
                    player_name: line.player_name,
                    status,
                    importance: None,
                }
            })
            .collect();

        if let Some(o) = overrides {
            if matched < o.len() {
                log::debug!(
                    "{}: {} of {} real-time report entries matched the roster",
                    team,
                    matched,
                    o.len()
                );
            }
        }
        Ok(roster)
    }

    /// Injury features for `team` as of `as_of`.
    ///
    /// With `weighted = false` only the counts and the naive severity are
    /// filled in.
    pub fn injury_impact(
        &self,
        scorer: &mut PlayerImportanceScorer<'s, S>,
        team: TeamId,
        as_of: NaiveDate,
        weighted: bool,
        overrides: Option<&RealtimeInjuries>,
    ) -> Result<InjuryImpact> {
        let mut roster = self.roster(team, as_of, overrides)?;
        if roster.is_empty() {
            log::debug!("{}: no roster before {}, injury features are null", team, as_of);
            return Ok(InjuryImpact::empty());
        }

        if !weighted {
            return Ok(self.naive_only(&roster));
        }

        let games_back = self.importance_games_back;
        for entry in roster.iter_mut() {
            entry.importance = scorer
                .importance(entry.player_id, team, games_back, as_of)?
                .map(|p| p.score);
        }
        let key_players: Vec<PlayerId> = scorer
            .top_players(team, self.top_players, games_back, as_of)?
            .into_iter()
            .map(|p| p.player_id)
            .collect();
        let team_total = scorer.team_total_importance(team, games_back, as_of)?;

        Ok(self.summarize(&roster, &key_players, team_total))
    }

    fn naive_only(&self, roster: &[RosterEntry]) -> InjuryImpact {
        let (out, questionable) = count_statuses(roster);
        InjuryImpact {
            total_players: Some(roster.len()),
            players_out: Some(out),
            players_questionable: Some(questionable),
            naive_severity: self.naive_severity(out, questionable, roster.len()),
            ..InjuryImpact::empty()
        }
    }

    fn naive_severity(&self, out: usize, questionable: usize, total: usize) -> Option<f64> {
        safe_div(
            out as f64 * self.weights.out + questionable as f64 * self.weights.questionable,
            total as f64,
        )
    }

    /// Combine a resolved roster with importance scores
    pub fn summarize(
        &self,
        roster: &[RosterEntry],
        key_players: &[PlayerId],
        team_total_importance: Option<f64>,
    ) -> InjuryImpact {
        if roster.is_empty() {
            return InjuryImpact::empty();
        }

        let (out, questionable) = count_statuses(roster);

        let mut weighted_score = 0.0;
        let mut importance_out = 0.0;
        for entry in roster.iter().filter(|e| !e.status.is_healthy()) {
            let importance = entry.importance.unwrap_or(0.0);
            weighted_score += importance * self.weights.weight(entry.status);
            if entry.status == InjuryStatus::Out {
                importance_out += importance;
            }
        }

        let key: HashSet<PlayerId> = key_players.iter().copied().collect();
        let key_out = roster
            .iter()
            .filter(|e| e.status == InjuryStatus::Out && key.contains(&e.player_id))
            .count();

        let weighted_severity = Some(weighted_score)
            .div_by(team_total_importance)
            .clamped(0.0, 1.0)
            .or(Some(weighted_score));

        InjuryImpact {
            total_players: Some(roster.len()),
            players_out: Some(out),
            players_questionable: Some(questionable),
            naive_severity: self.naive_severity(out, questionable, roster.len()),
            weighted_injury_score: Some(weighted_score),
            weighted_severity,
            key_player_out: Some(key_out > 0),
            key_players_out_count: Some(key_out),
            total_importance_out: Some(importance_out),
        }
    }

    /// Win rate and point differential over the last `games_back` games,
    /// split by whether every key player was available. Key players are the
    /// top players as of `as_of`; one counts as missing when listed out,
    /// absent from the box score, or under the minutes threshold.
    pub fn historical_injury_impact(
        &self,
        scorer: &mut PlayerImportanceScorer<'s, S>,
        team: TeamId,
        as_of: NaiveDate,
        games_back: usize,
    ) -> Result<HistoricalInjuryImpact> {
        let games: Vec<_> = self
            .store
            .get_team_games(team, as_of, games_back)?
            .into_iter()
            .filter(|g| g.date < as_of)
            .collect();
        if games.len() < self.historical_min_games {
            return Ok(HistoricalInjuryImpact::default());
        }

        let key_players: Vec<PlayerId> = scorer
            .top_players(team, self.top_players, self.importance_games_back, as_of)?
            .into_iter()
            .map(|p| p.player_id)
            .collect();
        if key_players.is_empty() {
            return Ok(HistoricalInjuryImpact::default());
        }

        let mut with = (WeightedTotal::new(), WeightedTotal::new());
        let mut without = (WeightedTotal::new(), WeightedTotal::new());
        for game in &games {
            let lines = self.store.get_player_box_scores(&game.game_id, team)?;
            let shorthanded = key_players.iter().any(|id| {
                match lines.iter().find(|l| l.player_id == *id) {
                    Some(l) => {
                        l.injury_status == InjuryStatus::Out
                            || l.minutes < self.key_player_min_minutes
                    }
                    None => true,
                }
            });

            let bucket = if shorthanded { &mut without } else { &mut with };
            bucket.0.push(game.did_win(team).map(flag), 1.0);
            bucket.1.push(game.margin_for(team).map(f64::from), 1.0);
        }

        let win_pct_with = with.0.mean();
        let win_pct_without = without.0.mean();
        let point_diff_with = with.1.mean();
        let point_diff_without = without.1.mean();

        Ok(HistoricalInjuryImpact {
            games_with: Some(with.0.count()),
            games_without: Some(without.0.count()),
            win_pct_with,
            win_pct_without,
            point_diff_with,
            point_diff_without,
            win_pct_delta: win_pct_without.minus(win_pct_with),
            point_diff_delta: point_diff_without.minus(point_diff_with),
        })
    }
}

/// Parse a real-time injury report of the form
/// `{ "<team id, abbreviation or name>": { "<player>": "<status>" } }`.
/// Statuses are free text and go through [`InjuryStatus::normalize`].
pub fn parse_injury_report(json: &str, teams: &[Team]) -> Result<HashMap<TeamId, RealtimeInjuries>> {
    let raw: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_str(json)?;
    let mut reports = HashMap::new();
    for (key, players) in raw {
        let team = resolve_team(&key, teams)
            .ok_or_else(|| HoopsError::Parse(format!("unknown team '{}' in injury report", key)))?;
        let report: RealtimeInjuries = players
            .into_iter()
            .map(|(name, status)| (name, InjuryStatus::normalize(&status)))
            .collect();
        reports.insert(team, report);
    }
    Ok(reports)
}

fn resolve_team(key: &str, teams: &[Team]) -> Option<TeamId> {
    let key = key.trim();
    if let Ok(id) = key.parse::<i64>() {
        return teams.iter().find(|t| t.id.0 == id).map(|t| t.id);
    }
    teams
        .iter()
        .find(|t| t.abbreviation.eq_ignore_ascii_case(key) || t.name.eq_ignore_ascii_case(key))
        .map(|t| t.id)
}

fn count_statuses(roster: &[RosterEntry]) -> (usize, usize) {
    let out = roster
        .iter()
        .filter(|e| e.status == InjuryStatus::Out)
        .count();
    let questionable = roster
        .iter()
        .filter(|e| e.status == InjuryStatus::Questionable)
        .count();
    (out, questionable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{day, League};
    use crate::data::Database;
    use approx::assert_relative_eq;

    fn entry(id: i64, status: InjuryStatus, importance: f64) -> RosterEntry {
        RosterEntry {
            player_id: PlayerId(id),
            player_name: format!("Player {}", id),
            status,
            importance: Some(importance),
        }
    }

    fn twelve_man_roster() -> Vec<RosterEntry> {
        let mut roster = vec![
            entry(1, InjuryStatus::Out, 0.85),
            entry(2, InjuryStatus::Out, 0.30),
            entry(3, InjuryStatus::Questionable, 0.55),
        ];
        for id in 4..=12 {
            roster.push(entry(id, InjuryStatus::Healthy, 0.2));
        }
        roster
    }

    #[test]
    fn test_fuzzy_name_match() {
        assert!(fuzzy_name_match("LeBron James", "lebron james"));
        assert!(fuzzy_name_match("LeBron James", "James, LeBron"));
        assert!(fuzzy_name_match("Jokic", "Nikola Jokic"));
        assert!(fuzzy_name_match("  Jayson   Tatum ", "jayson tatum"));
        assert!(!fuzzy_name_match("LeBron James", "Anthony Davis"));
        assert!(!fuzzy_name_match("", "Anthony Davis"));
        assert!(!fuzzy_name_match("LeBron James", "   "));
    }

    #[test]
    fn test_exact_report_entry_beats_partial_one() {
        let mut report = RealtimeInjuries::new();
        report.insert("Jalen".to_string(), InjuryStatus::Questionable);
        report.insert("Williams, Jalen".to_string(), InjuryStatus::Out);

        assert_eq!(override_status(&report, "Jalen Williams"), Some(InjuryStatus::Out));
        assert_eq!(
            override_status(&report, "Jalen Brunson"),
            Some(InjuryStatus::Questionable)
        );
        assert_eq!(override_status(&report, "Josh Giddey"), None);
        assert_eq!(override_status(&report, "  "), None);
    }

    #[test]
    fn test_parse_injury_report() {
        let league = League::new();
        let teams = league.db.get_all_teams().unwrap();
        let json = r#"{
            "BOS": {"Jayson Tatum": "Out", "Al Horford": "game time decision"},
            "2": {"Jalen Brunson": "day-to-day"},
            "Denver": {}
        }"#;
        let reports = parse_injury_report(json, &teams).unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[&TeamId(1)]["Jayson Tatum"], InjuryStatus::Out);
        assert_eq!(reports[&TeamId(1)]["Al Horford"], InjuryStatus::Questionable);
        assert_eq!(reports[&TeamId(2)]["Jalen Brunson"], InjuryStatus::Probable);
        assert!(reports[&TeamId(4)].is_empty());

        assert!(matches!(
            parse_injury_report(r#"{"LAL": {}}"#, &teams),
            Err(HoopsError::Parse(_))
        ));
        assert!(parse_injury_report("not json", &teams).is_err());
    }

    #[test]
    fn test_twelve_man_roster_severity() {
        let db = Database::in_memory().unwrap();
        let engine = InjuryImpactEngine::new(&db, &Config::default());
        let roster = twelve_man_roster();
        let total: f64 = roster.iter().filter_map(|e| e.importance).sum();

        let impact = engine.summarize(&roster, &[PlayerId(1), PlayerId(3)], Some(total));
        assert_eq!(impact.players_out, Some(2));
        assert_eq!(impact.players_questionable, Some(1));
        assert_relative_eq!(impact.naive_severity.unwrap(), 2.5 / 12.0, epsilon = 1e-12);
        assert_relative_eq!(impact.naive_severity.unwrap(), 0.208, epsilon = 1e-3);
        assert_relative_eq!(impact.weighted_injury_score.unwrap(), 1.425, epsilon = 1e-12);
        assert_relative_eq!(impact.weighted_severity.unwrap(), 1.425 / total, epsilon = 1e-12);
        assert_eq!(impact.key_player_out, Some(true));
        assert_eq!(impact.key_players_out_count, Some(1));
        assert_relative_eq!(impact.total_importance_out.unwrap(), 1.15, epsilon = 1e-12);
    }

    #[test]
    fn test_weighted_severity_falls_back_without_denominator() {
        let db = Database::in_memory().unwrap();
        let engine = InjuryImpactEngine::new(&db, &Config::default());
        let roster = twelve_man_roster();

        let impact = engine.summarize(&roster, &[], None);
        assert_relative_eq!(impact.weighted_severity.unwrap(), 1.425, epsilon = 1e-12);
        assert_eq!(impact.key_player_out, Some(false));

        let impact = engine.summarize(&roster, &[], Some(0.0));
        assert_relative_eq!(impact.weighted_severity.unwrap(), 1.425, epsilon = 1e-12);

        // a denominator smaller than the score is clamped
        let impact = engine.summarize(&roster, &[], Some(1.0));
        assert_eq!(impact.weighted_severity, Some(1.0));
    }

    #[test]
    fn test_empty_roster_is_all_null() {
        let league = League::new();
        let engine = InjuryImpactEngine::new(&league.db, &Config::default());
        let mut scorer = PlayerImportanceScorer::new(&league.db, 3);
        let impact = engine
            .injury_impact(&mut scorer, TeamId(1), day(10), true, None)
            .unwrap();
        assert_eq!(impact, InjuryImpact::empty());
        assert!(impact.is_empty());
        assert!(impact.players_out.is_none());

        assert!(engine.summarize(&[], &[], Some(1.0)).is_empty());
    }

    fn league_with_roster() -> League {
        let mut league = League::new();
        for d in 1..=4 {
            let id = league.finished(day(d), 1, 2, 100, 90);
            league.player(&id, 1, 1, "Jayson Tatum", 36.0, 28, 9, 5, Some(6));
            league.player(&id, 1, 2, "Jaylen Brown", 34.0, 22, 6, 4, Some(4));
            league.player(&id, 1, 3, "Derrick White", 30.0, 12, 4, 5, Some(3));
            if d < 4 {
                league.player(&id, 1, 4, "Al Horford", 26.0, 8, 7, 2, Some(1));
            } else {
                league.unavailable(&id, 1, 4, "Al Horford", InjuryStatus::Out);
            }
        }
        league
    }

    #[test]
    fn test_roster_from_last_game() {
        let league = league_with_roster();
        let engine = InjuryImpactEngine::new(&league.db, &Config::default());
        let mut scorer = PlayerImportanceScorer::new(&league.db, 3);
        let impact = engine
            .injury_impact(&mut scorer, TeamId(1), day(10), true, None)
            .unwrap();

        assert_eq!(impact.total_players, Some(4));
        assert_eq!(impact.players_out, Some(1));
        assert_eq!(impact.players_questionable, Some(0));
        assert_relative_eq!(impact.naive_severity.unwrap(), 0.25);
        assert!(impact.weighted_injury_score.unwrap() > 0.0);
        let severity = impact.weighted_severity.unwrap();
        assert!((0.0..=1.0).contains(&severity));
        // four players, top five: Horford is a key player
        assert_eq!(impact.key_player_out, Some(true));

        let naive = engine
            .injury_impact(&mut scorer, TeamId(1), day(10), false, None)
            .unwrap();
        assert_eq!(naive.naive_severity, impact.naive_severity);
        assert!(naive.weighted_injury_score.is_none());
    }

    #[test]
    fn test_realtime_overrides_win_over_box_score() {
        let league = league_with_roster();
        let engine = InjuryImpactEngine::new(&league.db, &Config::default());
        let mut scorer = PlayerImportanceScorer::new(&league.db, 3);

        let mut report = RealtimeInjuries::new();
        report.insert("Tatum, Jayson".to_string(), InjuryStatus::Out);
        report.insert("horford".to_string(), InjuryStatus::Healthy);
        report.insert("Somebody Else".to_string(), InjuryStatus::Out);

        let impact = engine
            .injury_impact(&mut scorer, TeamId(1), day(10), true, Some(&report))
            .unwrap();
        assert_eq!(impact.players_out, Some(1));
        let roster = engine.roster(TeamId(1), day(10), Some(&report)).unwrap();
        let tatum = roster.iter().find(|e| e.player_id == PlayerId(1)).unwrap();
        assert_eq!(tatum.status, InjuryStatus::Out);
        let horford = roster.iter().find(|e| e.player_id == PlayerId(4)).unwrap();
        assert_eq!(horford.status, InjuryStatus::Healthy);
    }

    #[test]
    fn test_historical_requires_enough_games() {
        let league = league_with_roster();
        let engine = InjuryImpactEngine::new(&league.db, &Config::default());
        let mut scorer = PlayerImportanceScorer::new(&league.db, 3);
        let hist = engine
            .historical_injury_impact(&mut scorer, TeamId(1), day(10), 20)
            .unwrap();
        assert_eq!(hist, HistoricalInjuryImpact::default());
    }

    #[test]
    fn test_historical_with_and_without_buckets() {
        let mut league = League::new();
        // 8 games with the star: 6 wins by 10, 2 losses by 4
        for d in 1..=8 {
            let (hs, aw) = if d <= 6 { (110, 100) } else { (96, 100) };
            let id = league.finished(day(d), 1, 2, hs, aw);
            league.player(&id, 1, 1, "Star Player", 36.0, 30, 8, 8, Some(8));
        }
        // 4 games without: 1 win by 2, 3 losses by 8
        for d in 9..=12 {
            let (hs, aw) = if d == 9 { (102, 100) } else { (92, 100) };
            let id = league.finished(day(d), 1, 2, hs, aw);
            league.unavailable(&id, 1, 1, "Star Player", InjuryStatus::Out);
        }

        let mut config = Config::default();
        config.features.top_players_count = 1;
        let engine = InjuryImpactEngine::new(&league.db, &config);
        let mut scorer = PlayerImportanceScorer::new(&league.db, 3);
        let hist = engine
            .historical_injury_impact(&mut scorer, TeamId(1), day(20), 20)
            .unwrap();

        assert_eq!(hist.games_with, Some(8));
        assert_eq!(hist.games_without, Some(4));
        assert_relative_eq!(hist.win_pct_with.unwrap(), 0.75);
        assert_relative_eq!(hist.win_pct_without.unwrap(), 0.25);
        assert_relative_eq!(hist.win_pct_delta.unwrap(), -0.5);
        assert_relative_eq!(hist.point_diff_with.unwrap(), (6.0 * 10.0 - 2.0 * 4.0) / 8.0);
        assert_relative_eq!(hist.point_diff_without.unwrap(), (2.0 - 3.0 * 8.0) / 4.0);
        assert!(hist.point_diff_delta.unwrap() < 0.0);
    }
}
