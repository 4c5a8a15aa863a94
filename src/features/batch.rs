//! Season-wide training matrix generation
//!
//! Finished games are split into disjoint chunks, one per worker. Each
//! worker opens its own database handle and aggregator, so importance memos
//! and injury overrides are never shared between threads. Every game uses
//! its own date as the cutoff.

use crate::data::Database;
use crate::features::aggregator::{FeatureAggregator, VectorOptions};
use crate::features::schema::FeatureSchema;
use crate::{Config, GameId, GameRecord, HoopsError, Result, TeamId};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Output format of a training matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixFormat {
    Json,
    Csv,
}

impl FromStr for MatrixFormat {
    type Err = HoopsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(MatrixFormat::Json),
            "csv" => Ok(MatrixFormat::Csv),
            other => Err(HoopsError::Parse(format!("unknown matrix format '{}'", other))),
        }
    }
}

/// One game's features with its outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingRow {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub home_win: Option<bool>,
    /// Home score − away score
    pub margin: Option<i32>,
    pub values: Vec<Option<f64>>,
}

/// Feature rows for a season, in date order, with the names they follow
#[derive(Debug, Clone, Serialize)]
pub struct TrainingMatrix {
    pub season: String,
    pub schema_version: u32,
    pub feature_names: Vec<String>,
    pub rows: Vec<TrainingRow>,
}

impl TrainingMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Header row, then one line per game. Nulls are empty cells.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut header = vec![
            "game_id".to_string(),
            "date".to_string(),
            "home_team_id".to_string(),
            "away_team_id".to_string(),
            "home_win".to_string(),
            "margin".to_string(),
        ];
        header.extend(self.feature_names.iter().cloned());
        writeln!(writer, "{}", header.join(","))?;

        for row in &self.rows {
            let mut cells = vec![
                csv_escape(row.game_id.as_str()),
                row.date.to_string(),
                row.home_team.0.to_string(),
                row.away_team.0.to_string(),
                row.home_win
                    .map(|w| if w { "1" } else { "0" }.to_string())
                    .unwrap_or_default(),
                row.margin.map(|m| m.to_string()).unwrap_or_default(),
            ];
            cells.extend(
                row.values
                    .iter()
                    .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
            );
            writeln!(writer, "{}", cells.join(","))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, format: MatrixFormat) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        match format {
            MatrixFormat::Json => self.write_json(writer),
            MatrixFormat::Csv => self.write_csv(writer),
        }
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Parallel generator for every finished game of a season
pub struct SeasonBatch {
    database_path: PathBuf,
    config: Config,
    workers: usize,
    use_cache: bool,
}

impl SeasonBatch {
    pub fn new<P: Into<PathBuf>>(database_path: P, config: Config) -> Self {
        let workers = config.batch.workers;
        SeasonBatch {
            database_path: database_path.into(),
            config,
            workers,
            use_cache: true,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn generate(&self, season: &str) -> Result<TrainingMatrix> {
        if self.workers == 0 {
            return Err(HoopsError::Config("workers must be at least 1".into()));
        }

        let db = Database::open(&self.database_path)?;
        let games: Vec<GameRecord> = db
            .get_season_games(season)?
            .into_iter()
            .filter(|g| g.is_finished())
            .collect();
        drop(db);

        let schema = FeatureSchema::from_config(&self.config.features);
        log::info!(
            "Generating {} feature vectors for season {} with {} workers",
            games.len(),
            season,
            self.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| HoopsError::Worker(format!("failed to start worker pool: {}", e)))?;

        let chunk_size = games.len().div_ceil(self.workers).max(1);
        let chunks: Vec<Result<Vec<TrainingRow>>> = pool.install(|| {
            games
                .par_chunks(chunk_size)
                .map(|chunk| self.vectorize_chunk(chunk))
                .collect()
        });

        let mut rows = Vec::with_capacity(games.len());
        for chunk in chunks {
            rows.extend(chunk?);
        }
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.game_id.0.cmp(&b.game_id.0)));

        Ok(TrainingMatrix {
            season: season.to_string(),
            schema_version: schema.version(),
            feature_names: schema.feature_names().to_vec(),
            rows,
        })
    }

    fn vectorize_chunk(&self, games: &[GameRecord]) -> Result<Vec<TrainingRow>> {
        let db = Database::open(&self.database_path)?;
        let mut aggregator = FeatureAggregator::new(&db, self.config.clone());
        let options = VectorOptions {
            use_cache: self.use_cache,
            ..VectorOptions::default()
        };

        let mut rows = Vec::with_capacity(games.len());
        for game in games {
            let vector = aggregator.create_feature_vector(
                &game.game_id,
                game.home_team,
                game.away_team,
                &VectorOptions {
                    as_of: Some(game.date),
                    ..options.clone()
                },
            )?;
            rows.push(TrainingRow {
                game_id: game.game_id.clone(),
                date: game.date,
                home_team: game.home_team,
                away_team: game.away_team,
                home_win: game.did_win(game.home_team),
                margin: game.margin_for(game.home_team),
                values: vector.values().to_vec(),
            });
        }
        log::debug!("Worker finished {} games", rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{day, League};

    fn season_on_disk(path: &Path) {
        let mut league = League::with_db(Database::open(path).unwrap());
        let pairs = [(1, 2), (3, 4), (2, 3), (4, 1), (1, 3), (2, 4), (3, 1), (4, 2)];
        for (i, (home, away)) in pairs.iter().enumerate() {
            let d = i as i64 + 1;
            league.finished(day(d), *home, *away, 100 + d as u16, 98);
        }
        league.scheduled(day(30), 1, 2);
    }

    #[test]
    fn test_matrix_format_parse() {
        assert_eq!("json".parse::<MatrixFormat>().unwrap(), MatrixFormat::Json);
        assert_eq!("CSV".parse::<MatrixFormat>().unwrap(), MatrixFormat::Csv);
        assert!("parquet".parse::<MatrixFormat>().is_err());
    }

    #[test]
    fn test_workers_produce_the_same_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("league.db");
        season_on_disk(&path);

        let config = Config::default();
        let single = SeasonBatch::new(&path, config.clone())
            .with_workers(1)
            .with_cache(false)
            .generate("2023-24")
            .unwrap();
        let parallel = SeasonBatch::new(&path, config)
            .with_workers(2)
            .with_cache(false)
            .generate("2023-24")
            .unwrap();

        assert_eq!(single.len(), 8);
        assert_eq!(single.feature_names, FeatureSchema::current().feature_names());
        assert_eq!(single.rows, parallel.rows);
        assert!(single.rows.windows(2).all(|w| w[0].date <= w[1].date));
        assert!(single.rows.iter().all(|r| r.home_win.is_some()));

        // the opening games have no history behind them
        let first = &single.rows[0];
        let win_pct = single
            .feature_names
            .iter()
            .position(|n| n == "home_win_pct")
            .unwrap();
        assert_eq!(first.values[win_pct], None);
    }

    #[test]
    fn test_matrix_output_formats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("league.db");
        season_on_disk(&path);

        let matrix = SeasonBatch::new(&path, Config::default())
            .with_workers(2)
            .generate("2023-24")
            .unwrap();

        let csv_path = dir.path().join("out/matrix.csv");
        matrix.save(&csv_path, MatrixFormat::Csv).unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), matrix.len() + 1);
        assert!(lines[0].starts_with("game_id,date,home_team_id,away_team_id,home_win,margin,"));
        let columns = lines[0].split(',').count();
        assert!(lines.iter().all(|l| l.split(',').count() == columns));

        let json_path = dir.path().join("matrix.json");
        matrix.save(&json_path, MatrixFormat::Json).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(
            json["feature_names"].as_array().unwrap().len(),
            matrix.feature_names.len()
        );
        assert_eq!(json["rows"].as_array().unwrap().len(), matrix.len());
    }

    #[test]
    fn test_empty_season() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("league.db");
        season_on_disk(&path);
        let matrix = SeasonBatch::new(&path, Config::default())
            .generate("1999-00")
            .unwrap();
        assert!(matrix.is_empty());
        assert!(!matrix.feature_names.is_empty());
    }
}
