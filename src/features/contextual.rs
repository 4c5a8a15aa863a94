//! Schedule and situational context
//!
//! Rest, back-to-backs and schedule density are measured from finished
//! games before the cutoff. `days_until_next` looks forward at the
//! schedule only; it never reads a result.

use crate::data::StatsStore;
use crate::features::nullable::NullableExt;
use crate::{GameRecord, Result, SeasonType, TeamId};
use chrono::NaiveDate;

/// Trailing window for schedule density
const DENSITY_WINDOW_DAYS: i64 = 7;

/// Context for one side of a game
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamContext {
    /// Idle days since the previous game (0 on the second night of a back-to-back)
    pub rest_days: Option<i64>,
    pub is_back_to_back: Option<bool>,
    pub days_until_next: Option<i64>,
    pub games_last_7_days: usize,
}

/// Context for a game
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameContext {
    pub home: TeamContext,
    pub away: TeamContext,
    /// home rest − away rest
    pub rest_differential: Option<f64>,
    /// `None` when either team's conference is unknown
    pub same_conference: Option<bool>,
    pub same_division: Option<bool>,
    pub is_playoffs: bool,
}

pub struct ContextualEngine<'s, S: StatsStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: StatsStore + ?Sized> ContextualEngine<'s, S> {
    pub fn new(store: &'s S) -> Self {
        ContextualEngine { store }
    }

    /// Idle days between the team's most recent game before `date` and `date`
    pub fn rest_days(&self, team: TeamId, date: NaiveDate) -> Result<Option<i64>> {
        let last = self.store.get_team_games(team, date, 1)?;
        Ok(last
            .first()
            .filter(|g| g.date < date)
            .map(|g| ((date - g.date).num_days() - 1).max(0)))
    }

    pub fn is_back_to_back(&self, team: TeamId, date: NaiveDate) -> Result<Option<bool>> {
        Ok(self.rest_days(team, date)?.map(|d| d == 0))
    }

    /// Days from `date` to the team's next game on the schedule
    pub fn days_until_next_game(&self, team: TeamId, date: NaiveDate) -> Result<Option<i64>> {
        Ok(self
            .store
            .get_next_game_date(team, date)?
            .map(|next| (next - date).num_days()))
    }

    /// Games played in the `days` days before `date`
    pub fn games_in_last_days(&self, team: TeamId, date: NaiveDate, days: i64) -> Result<usize> {
        let recent = self
            .store
            .get_team_games(team, date, days.max(0) as usize + 1)?;
        Ok(recent
            .iter()
            .filter(|g| {
                let diff = (date - g.date).num_days();
                diff > 0 && diff <= days
            })
            .count())
    }

    pub fn team_context(&self, team: TeamId, as_of: NaiveDate) -> Result<TeamContext> {
        let rest_days = self.rest_days(team, as_of)?;
        Ok(TeamContext {
            rest_days,
            is_back_to_back: rest_days.map(|d| d == 0),
            days_until_next: self.days_until_next_game(team, as_of)?,
            games_last_7_days: self.games_in_last_days(team, as_of, DENSITY_WINDOW_DAYS)?,
        })
    }

    /// Full context for `game` with every lookup cut off at `as_of`
    pub fn game_context(&self, game: &GameRecord, as_of: NaiveDate) -> Result<GameContext> {
        let home = self.team_context(game.home_team, as_of)?;
        let away = self.team_context(game.away_team, as_of)?;

        let home_team = self.store.get_team(game.home_team)?;
        let away_team = self.store.get_team(game.away_team)?;
        let same_conference = same_group(
            home_team.as_ref().and_then(|t| t.conference.as_deref()),
            away_team.as_ref().and_then(|t| t.conference.as_deref()),
        );
        let same_division = same_group(
            home_team.as_ref().and_then(|t| t.division.as_deref()),
            away_team.as_ref().and_then(|t| t.division.as_deref()),
        );

        let rest_differential = home
            .rest_days
            .map(|d| d as f64)
            .minus(away.rest_days.map(|d| d as f64));

        Ok(GameContext {
            rest_differential,
            same_conference,
            same_division,
            is_playoffs: game.season_type == SeasonType::Playoffs,
            home,
            away,
        })
    }
}

fn same_group(a: Option<&str>, b: Option<&str>) -> Option<bool> {
    Some(a?.eq_ignore_ascii_case(b?))
}
