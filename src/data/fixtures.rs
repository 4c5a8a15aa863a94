//! In-memory league used by the unit tests

use crate::data::Database;
use crate::{
    BoxScoreRecord, GameId, GameRecord, GameStatus, InjuryStatus, PlayerBoxScoreRecord, PlayerId,
    SeasonType, Team, TeamId,
};
use chrono::{Duration, NaiveDate};

/// `n` days after 2024-01-01
pub fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n)
}

/// Standard team line: only the points vary
pub fn box_line(game_id: &GameId, team: i64, is_home: bool, points: u16) -> BoxScoreRecord {
    BoxScoreRecord {
        game_id: game_id.clone(),
        team_id: TeamId(team),
        is_home,
        points,
        field_goals_made: 40,
        field_goals_attempted: 88,
        three_pointers_made: 12,
        three_pointers_attempted: 33,
        free_throws_made: 18,
        free_throws_attempted: 22,
        offensive_rebounds: Some(10),
        defensive_rebounds: Some(34),
        total_rebounds: Some(44),
        assists: Some(25),
        steals: Some(8),
        blocks: Some(5),
        turnovers: Some(13),
        personal_fouls: Some(19),
    }
}

pub struct League {
    pub db: Database,
    next_game: u32,
}

impl League {
    /// Four teams: 1 and 2 share a division, 3 is in the same conference,
    /// 4 is in the other conference.
    pub fn new() -> Self {
        Self::with_db(Database::in_memory().unwrap())
    }

    pub fn with_db(db: Database) -> Self {
        let teams = [
            (1, "Boston", "BOS", "East", "Atlantic"),
            (2, "New York", "NYK", "East", "Atlantic"),
            (3, "Chicago", "CHI", "East", "Central"),
            (4, "Denver", "DEN", "West", "Northwest"),
        ];
        for (id, name, abbr, conf, div) in teams {
            db.upsert_team(&Team {
                id: TeamId(id),
                name: name.to_string(),
                abbreviation: abbr.to_string(),
                conference: Some(conf.to_string()),
                division: Some(div.to_string()),
            })
            .unwrap();
        }
        League { db, next_game: 0 }
    }

    fn next_id(&mut self) -> GameId {
        self.next_game += 1;
        GameId(format!("G{:04}", self.next_game))
    }

    /// Finished regular-season game with standard box scores
    pub fn finished(
        &mut self,
        date: NaiveDate,
        home: i64,
        away: i64,
        home_score: u16,
        away_score: u16,
    ) -> GameId {
        let id = self.next_id();
        self.db
            .upsert_game(&GameRecord {
                game_id: id.clone(),
                season: "2023-24".to_string(),
                season_type: SeasonType::Regular,
                date,
                home_team: TeamId(home),
                away_team: TeamId(away),
                home_score: Some(home_score),
                away_score: Some(away_score),
                status: GameStatus::Finished,
            })
            .unwrap();
        self.db
            .upsert_box_score(&box_line(&id, home, true, home_score))
            .unwrap();
        self.db
            .upsert_box_score(&box_line(&id, away, false, away_score))
            .unwrap();
        id
    }

    pub fn scheduled(&mut self, date: NaiveDate, home: i64, away: i64) -> GameId {
        let id = self.next_id();
        self.db
            .upsert_game(&GameRecord {
                game_id: id.clone(),
                season: "2023-24".to_string(),
                season_type: SeasonType::Regular,
                date,
                home_team: TeamId(home),
                away_team: TeamId(away),
                home_score: None,
                away_score: None,
                status: GameStatus::Scheduled,
            })
            .unwrap();
        id
    }

    /// A healthy player line
    #[allow(clippy::too_many_arguments)]
    pub fn player(
        &mut self,
        game: &GameId,
        team: i64,
        player_id: i64,
        name: &str,
        minutes: f64,
        points: u16,
        rebounds: u16,
        assists: u16,
        plus_minus: Option<i16>,
    ) {
        self.db
            .upsert_player_box_score(&PlayerBoxScoreRecord {
                game_id: game.clone(),
                player_id: PlayerId(player_id),
                player_name: name.to_string(),
                team_id: TeamId(team),
                minutes,
                points,
                rebounds,
                assists,
                field_goals_made: points / 3,
                field_goals_attempted: points / 2,
                three_pointers_made: 0,
                three_pointers_attempted: 0,
                free_throws_made: 0,
                free_throws_attempted: 0,
                plus_minus,
                injury_status: InjuryStatus::Healthy,
            })
            .unwrap();
    }

    /// A player listed on the game's report without playing
    pub fn unavailable(
        &mut self,
        game: &GameId,
        team: i64,
        player_id: i64,
        name: &str,
        status: InjuryStatus,
    ) {
        self.db
            .upsert_player_box_score(&PlayerBoxScoreRecord {
                game_id: game.clone(),
                player_id: PlayerId(player_id),
                player_name: name.to_string(),
                team_id: TeamId(team),
                minutes: 0.0,
                points: 0,
                rebounds: 0,
                assists: 0,
                field_goals_made: 0,
                field_goals_attempted: 0,
                three_pointers_made: 0,
                three_pointers_attempted: 0,
                free_throws_made: 0,
                free_throws_attempted: 0,
                plus_minus: None,
                injury_status: status,
            })
            .unwrap();
    }
}
