//! SQLite database management for basketball data

use crate::data::store::{FeatureCache, StatsStore, StoredFeature};
use crate::features::schema::FeatureCategory;
use crate::{
    BettingLine, BoxScoreRecord, GameId, GameRecord, GameStatus, HoopsError, InjuryStatus,
    PlayerBoxScoreRecord, PlayerId, Result, SeasonType, Team, TeamId,
};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

const DATE_FORMAT: &str = "%Y-%m-%d";

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const GAME_COLUMNS: &str = "game_id, season, season_type, date, home_team_id, away_team_id,
     home_score, away_score, status";

const BOX_COLUMNS: &str = "game_id, team_id, is_home, points, fgm, fga, tpm, tpa, ftm, fta,
     orb, drb, trb, ast, stl, blk, tov, pf";

const PLAYER_COLUMNS: &str = "p.game_id, p.player_id, p.player_name, p.team_id, p.minutes,
     p.points, p.rebounds, p.assists, p.fgm, p.fga, p.tpm, p.tpa, p.ftm, p.fta,
     p.plus_minus, p.injury_status";

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        // batch workers each hold a connection to the same file
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                abbreviation TEXT NOT NULL,
                conference TEXT,
                division TEXT
            );

            CREATE TABLE IF NOT EXISTS games (
                game_id TEXT PRIMARY KEY,
                season TEXT NOT NULL,
                season_type TEXT NOT NULL DEFAULT 'regular',
                date TEXT NOT NULL,
                home_team_id INTEGER NOT NULL REFERENCES teams(id),
                away_team_id INTEGER NOT NULL REFERENCES teams(id),
                home_score INTEGER,
                away_score INTEGER,
                status TEXT NOT NULL DEFAULT 'scheduled'
            );

            CREATE TABLE IF NOT EXISTS team_box_scores (
                game_id TEXT NOT NULL REFERENCES games(game_id),
                team_id INTEGER NOT NULL REFERENCES teams(id),
                is_home INTEGER NOT NULL,
                points INTEGER NOT NULL,
                fgm INTEGER NOT NULL,
                fga INTEGER NOT NULL,
                tpm INTEGER NOT NULL,
                tpa INTEGER NOT NULL,
                ftm INTEGER NOT NULL,
                fta INTEGER NOT NULL,
                orb INTEGER,
                drb INTEGER,
                trb INTEGER,
                ast INTEGER,
                stl INTEGER,
                blk INTEGER,
                tov INTEGER,
                pf INTEGER,
                PRIMARY KEY (game_id, team_id)
            );

            CREATE TABLE IF NOT EXISTS player_box_scores (
                game_id TEXT NOT NULL REFERENCES games(game_id),
                player_id INTEGER NOT NULL,
                player_name TEXT NOT NULL,
                team_id INTEGER NOT NULL REFERENCES teams(id),
                minutes REAL NOT NULL DEFAULT 0,
                points INTEGER NOT NULL DEFAULT 0,
                rebounds INTEGER NOT NULL DEFAULT 0,
                assists INTEGER NOT NULL DEFAULT 0,
                fgm INTEGER NOT NULL DEFAULT 0,
                fga INTEGER NOT NULL DEFAULT 0,
                tpm INTEGER NOT NULL DEFAULT 0,
                tpa INTEGER NOT NULL DEFAULT 0,
                ftm INTEGER NOT NULL DEFAULT 0,
                fta INTEGER NOT NULL DEFAULT 0,
                plus_minus INTEGER,
                injury_status TEXT NOT NULL DEFAULT 'healthy',
                PRIMARY KEY (game_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS betting_lines (
                game_id TEXT NOT NULL REFERENCES games(game_id),
                sportsbook TEXT NOT NULL,
                spread_home REAL,
                moneyline_home INTEGER,
                moneyline_away INTEGER,
                over_under REAL,
                PRIMARY KEY (game_id, sportsbook)
            );

            CREATE TABLE IF NOT EXISTS features (
                game_id TEXT NOT NULL,
                schema_version INTEGER NOT NULL,
                position INTEGER NOT NULL,
                feature_name TEXT NOT NULL,
                value REAL,
                category TEXT NOT NULL,
                team_id INTEGER,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (game_id, schema_version, feature_name)
            );

            CREATE INDEX IF NOT EXISTS idx_games_date ON games(date);
            CREATE INDEX IF NOT EXISTS idx_games_home ON games(home_team_id, date);
            CREATE INDEX IF NOT EXISTS idx_games_away ON games(away_team_id, date);
            CREATE INDEX IF NOT EXISTS idx_player_lines ON player_box_scores(player_id, team_id);
            "#,
        )?;
        Ok(())
    }

    /// Run `f` inside a single transaction
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // ==================== Team Operations ====================

    /// Insert or update a team
    pub fn upsert_team(&self, team: &Team) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO teams (id, name, abbreviation, conference, division)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                abbreviation = excluded.abbreviation,
                conference = COALESCE(excluded.conference, conference),
                division = COALESCE(excluded.division, division)
            "#,
            params![
                team.id.0,
                team.name,
                team.abbreviation,
                team.conference,
                team.division
            ],
        )?;
        Ok(())
    }

    /// Get all teams
    pub fn get_all_teams(&self) -> Result<Vec<Team>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, abbreviation, conference, division FROM teams ORDER BY name",
        )?;

        let teams = stmt
            .query_map([], Self::row_to_team)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(teams)
    }

    fn row_to_team(row: &Row) -> rusqlite::Result<Team> {
        Ok(Team {
            id: TeamId(row.get(0)?),
            name: row.get(1)?,
            abbreviation: row.get(2)?,
            conference: row.get(3)?,
            division: row.get(4)?,
        })
    }

    // ==================== Game Operations ====================

    /// Insert or update a game. A finished game is never downgraded back
    /// to scheduled.
    pub fn upsert_game(&self, game: &GameRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO games (game_id, season, season_type, date, home_team_id, away_team_id,
                               home_score, away_score, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(game_id) DO UPDATE SET
                season = excluded.season,
                season_type = excluded.season_type,
                date = excluded.date,
                home_team_id = excluded.home_team_id,
                away_team_id = excluded.away_team_id,
                home_score = COALESCE(excluded.home_score, home_score),
                away_score = COALESCE(excluded.away_score, away_score),
                status = CASE WHEN status = 'finished' THEN status ELSE excluded.status END
            "#,
            params![
                game.game_id.as_str(),
                game.season,
                game.season_type.as_str(),
                game.date.format(DATE_FORMAT).to_string(),
                game.home_team.0,
                game.away_team.0,
                game.home_score,
                game.away_score,
                game.status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// All games of a season in date order
    pub fn get_season_games(&self, season: &str) -> Result<Vec<GameRecord>> {
        let sql = format!(
            "SELECT {} FROM games WHERE season = ?1 ORDER BY date, game_id",
            GAME_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let games = stmt
            .query_map(params![season], Self::row_to_game)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(games)
    }

    fn row_to_game(row: &Row) -> rusqlite::Result<GameRecord> {
        let season_type: String = row.get(2)?;
        let status: String = row.get(8)?;
        Ok(GameRecord {
            game_id: GameId(row.get(0)?),
            season: row.get(1)?,
            season_type: SeasonType::parse(&season_type)
                .ok_or_else(|| conversion_error(2, format!("season type '{}'", season_type)))?,
            date: date_column(row, 3)?,
            home_team: TeamId(row.get(4)?),
            away_team: TeamId(row.get(5)?),
            home_score: row.get(6)?,
            away_score: row.get(7)?,
            status: GameStatus::parse(&status)
                .ok_or_else(|| conversion_error(8, format!("game status '{}'", status)))?,
        })
    }

    // ==================== Box Score Operations ====================

    /// Insert or update a team box score line
    pub fn upsert_box_score(&self, line: &BoxScoreRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO team_box_scores (game_id, team_id, is_home, points, fgm, fga, tpm, tpa,
                                         ftm, fta, orb, drb, trb, ast, stl, blk, tov, pf)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT(game_id, team_id) DO UPDATE SET
                is_home = excluded.is_home,
                points = excluded.points,
                fgm = excluded.fgm,
                fga = excluded.fga,
                tpm = excluded.tpm,
                tpa = excluded.tpa,
                ftm = excluded.ftm,
                fta = excluded.fta,
                orb = excluded.orb,
                drb = excluded.drb,
                trb = excluded.trb,
                ast = excluded.ast,
                stl = excluded.stl,
                blk = excluded.blk,
                tov = excluded.tov,
                pf = excluded.pf
            "#,
            params![
                line.game_id.as_str(),
                line.team_id.0,
                line.is_home,
                line.points,
                line.field_goals_made,
                line.field_goals_attempted,
                line.three_pointers_made,
                line.three_pointers_attempted,
                line.free_throws_made,
                line.free_throws_attempted,
                line.offensive_rebounds,
                line.defensive_rebounds,
                line.total_rebounds,
                line.assists,
                line.steals,
                line.blocks,
                line.turnovers,
                line.personal_fouls,
            ],
        )?;
        Ok(())
    }

    fn row_to_box_score(row: &Row) -> rusqlite::Result<BoxScoreRecord> {
        Ok(BoxScoreRecord {
            game_id: GameId(row.get(0)?),
            team_id: TeamId(row.get(1)?),
            is_home: row.get(2)?,
            points: row.get(3)?,
            field_goals_made: row.get(4)?,
            field_goals_attempted: row.get(5)?,
            three_pointers_made: row.get(6)?,
            three_pointers_attempted: row.get(7)?,
            free_throws_made: row.get(8)?,
            free_throws_attempted: row.get(9)?,
            offensive_rebounds: row.get(10)?,
            defensive_rebounds: row.get(11)?,
            total_rebounds: row.get(12)?,
            assists: row.get(13)?,
            steals: row.get(14)?,
            blocks: row.get(15)?,
            turnovers: row.get(16)?,
            personal_fouls: row.get(17)?,
        })
    }

    /// Insert or update a player box score line
    pub fn upsert_player_box_score(&self, line: &PlayerBoxScoreRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO player_box_scores (game_id, player_id, player_name, team_id, minutes,
                                           points, rebounds, assists, fgm, fga, tpm, tpa,
                                           ftm, fta, plus_minus, injury_status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ON CONFLICT(game_id, player_id) DO UPDATE SET
                player_name = excluded.player_name,
                team_id = excluded.team_id,
                minutes = excluded.minutes,
                points = excluded.points,
                rebounds = excluded.rebounds,
                assists = excluded.assists,
                fgm = excluded.fgm,
                fga = excluded.fga,
                tpm = excluded.tpm,
                tpa = excluded.tpa,
                ftm = excluded.ftm,
                fta = excluded.fta,
                plus_minus = excluded.plus_minus,
                injury_status = excluded.injury_status
            "#,
            params![
                line.game_id.as_str(),
                line.player_id.0,
                line.player_name,
                line.team_id.0,
                line.minutes,
                line.points,
                line.rebounds,
                line.assists,
                line.field_goals_made,
                line.field_goals_attempted,
                line.three_pointers_made,
                line.three_pointers_attempted,
                line.free_throws_made,
                line.free_throws_attempted,
                line.plus_minus,
                line.injury_status.as_str(),
            ],
        )?;
        Ok(())
    }

    fn row_to_player_line(row: &Row) -> rusqlite::Result<PlayerBoxScoreRecord> {
        let status: String = row.get(15)?;
        Ok(PlayerBoxScoreRecord {
            game_id: GameId(row.get(0)?),
            player_id: PlayerId(row.get(1)?),
            player_name: row.get(2)?,
            team_id: TeamId(row.get(3)?),
            minutes: row.get(4)?,
            points: row.get(5)?,
            rebounds: row.get(6)?,
            assists: row.get(7)?,
            field_goals_made: row.get(8)?,
            field_goals_attempted: row.get(9)?,
            three_pointers_made: row.get(10)?,
            three_pointers_attempted: row.get(11)?,
            free_throws_made: row.get(12)?,
            free_throws_attempted: row.get(13)?,
            plus_minus: row.get(14)?,
            injury_status: InjuryStatus::normalize(&status),
        })
    }

    // ==================== Betting Lines ====================

    /// Insert or update a sportsbook line
    pub fn upsert_betting_line(&self, line: &BettingLine) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO betting_lines (game_id, sportsbook, spread_home, moneyline_home,
                                       moneyline_away, over_under)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(game_id, sportsbook) DO UPDATE SET
                spread_home = excluded.spread_home,
                moneyline_home = excluded.moneyline_home,
                moneyline_away = excluded.moneyline_away,
                over_under = excluded.over_under
            "#,
            params![
                line.game_id.as_str(),
                line.sportsbook,
                line.spread_home,
                line.moneyline_home,
                line.moneyline_away,
                line.over_under,
            ],
        )?;
        Ok(())
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let min_date: Option<String> = self
            .conn
            .query_row("SELECT MIN(date) FROM games", [], |row| row.get(0))
            .optional()?
            .flatten();

        let max_date: Option<String> = self
            .conn
            .query_row("SELECT MAX(date) FROM games", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(DatabaseStats {
            team_count: count("SELECT COUNT(*) FROM teams")?,
            game_count: count("SELECT COUNT(*) FROM games")?,
            finished_game_count: count("SELECT COUNT(*) FROM games WHERE status = 'finished'")?,
            box_score_count: count("SELECT COUNT(*) FROM team_box_scores")?,
            player_line_count: count("SELECT COUNT(*) FROM player_box_scores")?,
            cached_vector_count: count(
                "SELECT COUNT(*) FROM (SELECT DISTINCT game_id, schema_version FROM features)",
            )?,
            earliest_game: min_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
            latest_game: max_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
        })
    }
}

impl StatsStore for Database {
    fn get_game(&self, game_id: &GameId) -> Result<Option<GameRecord>> {
        let sql = format!("SELECT {} FROM games WHERE game_id = ?1", GAME_COLUMNS);
        let game = self
            .conn
            .query_row(&sql, params![game_id.as_str()], Self::row_to_game)
            .optional()?;
        Ok(game)
    }

    fn get_team(&self, team: TeamId) -> Result<Option<Team>> {
        let team = self
            .conn
            .query_row(
                "SELECT id, name, abbreviation, conference, division FROM teams WHERE id = ?1",
                params![team.0],
                Self::row_to_team,
            )
            .optional()?;
        Ok(team)
    }

    fn get_team_games(
        &self,
        team: TeamId,
        before: NaiveDate,
        limit: usize,
    ) -> Result<Vec<GameRecord>> {
        let sql = format!(
            "SELECT {} FROM games
             WHERE (home_team_id = ?1 OR away_team_id = ?1)
               AND status = 'finished'
               AND home_score IS NOT NULL AND away_score IS NOT NULL
               AND date < ?2
             ORDER BY date DESC, game_id DESC
             LIMIT ?3",
            GAME_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let games = stmt
            .query_map(
                params![team.0, before.format(DATE_FORMAT).to_string(), sql_limit(limit)],
                Self::row_to_game,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(games)
    }

    fn get_box_score(&self, game_id: &GameId, team: TeamId) -> Result<Option<BoxScoreRecord>> {
        let sql = format!(
            "SELECT {} FROM team_box_scores WHERE game_id = ?1 AND team_id = ?2",
            BOX_COLUMNS
        );
        let line = self
            .conn
            .query_row(&sql, params![game_id.as_str(), team.0], Self::row_to_box_score)
            .optional()?;
        Ok(line)
    }

    fn get_player_box_scores(
        &self,
        game_id: &GameId,
        team: TeamId,
    ) -> Result<Vec<PlayerBoxScoreRecord>> {
        let sql = format!(
            "SELECT {} FROM player_box_scores p
             WHERE p.game_id = ?1 AND p.team_id = ?2
             ORDER BY p.minutes DESC, p.player_id",
            PLAYER_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let lines = stmt
            .query_map(params![game_id.as_str(), team.0], Self::row_to_player_line)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    fn get_player_games(
        &self,
        player: PlayerId,
        team: TeamId,
        before: NaiveDate,
        limit: usize,
    ) -> Result<Vec<(NaiveDate, PlayerBoxScoreRecord)>> {
        let sql = format!(
            "SELECT {}, g.date FROM player_box_scores p
             JOIN games g ON g.game_id = p.game_id
             WHERE p.player_id = ?1 AND p.team_id = ?2
               AND g.status = 'finished' AND g.date < ?3
             ORDER BY g.date DESC, g.game_id DESC
             LIMIT ?4",
            PLAYER_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let lines = stmt
            .query_map(
                params![
                    player.0,
                    team.0,
                    before.format(DATE_FORMAT).to_string(),
                    sql_limit(limit)
                ],
                |row| Ok((date_column(row, 16)?, Self::row_to_player_line(row)?)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    fn get_next_game_date(&self, team: TeamId, after: NaiveDate) -> Result<Option<NaiveDate>> {
        let next: Option<String> = self.conn.query_row(
            "SELECT MIN(date) FROM games
             WHERE (home_team_id = ?1 OR away_team_id = ?1) AND date > ?2",
            params![team.0, after.format(DATE_FORMAT).to_string()],
            |row| row.get(0),
        )?;
        next.map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map_err(|e| HoopsError::Parse(format!("bad game date '{}': {}", s, e)))
        })
        .transpose()
    }

    fn get_head_to_head(
        &self,
        a: TeamId,
        b: TeamId,
        before: NaiveDate,
        limit: usize,
    ) -> Result<Vec<GameRecord>> {
        let sql = format!(
            "SELECT {} FROM games
             WHERE ((home_team_id = ?1 AND away_team_id = ?2)
                 OR (home_team_id = ?2 AND away_team_id = ?1))
               AND status = 'finished'
               AND home_score IS NOT NULL AND away_score IS NOT NULL
               AND date < ?3
             ORDER BY date DESC, game_id DESC
             LIMIT ?4",
            GAME_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let games = stmt
            .query_map(
                params![a.0, b.0, before.format(DATE_FORMAT).to_string(), sql_limit(limit)],
                Self::row_to_game,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(games)
    }

    fn get_betting_lines(&self, game_id: &GameId) -> Result<Vec<BettingLine>> {
        let mut stmt = self.conn.prepare(
            "SELECT game_id, sportsbook, spread_home, moneyline_home, moneyline_away, over_under
             FROM betting_lines WHERE game_id = ?1 ORDER BY sportsbook",
        )?;
        let lines = stmt
            .query_map(params![game_id.as_str()], |row| {
                Ok(BettingLine {
                    game_id: GameId(row.get(0)?),
                    sportsbook: row.get(1)?,
                    spread_home: row.get(2)?,
                    moneyline_home: row.get(3)?,
                    moneyline_away: row.get(4)?,
                    over_under: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lines)
    }
}

impl FeatureCache for Database {
    fn load_features(&self, game_id: &GameId, schema_version: u32) -> Result<Vec<StoredFeature>> {
        let mut stmt = self.conn.prepare(
            "SELECT feature_name, value, category, team_id FROM features
             WHERE game_id = ?1 AND schema_version = ?2
             ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![game_id.as_str(), schema_version], |row| {
                let category: String = row.get(2)?;
                Ok(StoredFeature {
                    name: row.get(0)?,
                    value: row.get(1)?,
                    category: FeatureCategory::parse(&category)
                        .ok_or_else(|| conversion_error(2, format!("category '{}'", category)))?,
                    team_id: row.get::<_, Option<i64>>(3)?.map(TeamId),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn save_features(
        &self,
        game_id: &GameId,
        schema_version: u32,
        features: &[StoredFeature],
    ) -> Result<()> {
        self.in_transaction(|db| {
            db.conn.execute(
                "DELETE FROM features WHERE game_id = ?1 AND schema_version = ?2",
                params![game_id.as_str(), schema_version],
            )?;
            let mut stmt = db.conn.prepare(
                "INSERT INTO features (game_id, schema_version, position, feature_name, value,
                                       category, team_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (position, feature) in features.iter().enumerate() {
                stmt.execute(params![
                    game_id.as_str(),
                    schema_version,
                    position as i64,
                    feature.name,
                    feature.value,
                    feature.category.as_str(),
                    feature.team_id.map(|t| t.0),
                ])?;
            }
            Ok(())
        })?;
        log::debug!("Saved {} features for game {}", features.len(), game_id);
        Ok(())
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub team_count: usize,
    pub game_count: usize,
    pub finished_game_count: usize,
    pub box_score_count: usize,
    pub player_line_count: usize,
    pub cached_vector_count: usize,
    pub earliest_game: Option<NaiveDate>,
    pub latest_game: Option<NaiveDate>,
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn date_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversion_error(idx: usize, what: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(HoopsError::Parse(format!("unrecognised {}", what))),
    )
}
