//! Basketball feature engine CLI
//!
//! Imports box score data and turns games into leakage-safe feature vectors
//! for win/margin models.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use hoops::{Config, Result};

#[derive(Parser)]
#[command(name = "hoops")]
#[command(about = "Leakage-safe basketball feature engineering", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Feature generation commands
    Features {
        #[command(subcommand)]
        action: FeatureCommands,
    },
    /// Feature schema commands
    Schema {
        #[command(subcommand)]
        action: SchemaCommands,
    },
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import a JSON season bundle
    Import {
        /// Bundle file
        bundle: String,
    },
    /// Show database status
    Status,
}

#[derive(Subcommand)]
enum FeatureCommands {
    /// Compute the feature vector for one game
    Game {
        game_id: String,
        /// Cutoff date (YYYY-MM-DD); defaults to the game date
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Window for the headline team metrics
        #[arg(long)]
        window: Option<usize>,
        /// Ignore cached vectors
        #[arg(long)]
        no_cache: bool,
        /// Real-time injury report (JSON)
        #[arg(long)]
        injuries: Option<String>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Build the training matrix for every finished game of a season
    Season {
        /// Season label, e.g. 2023-24
        season: String,
        /// Output file
        #[arg(short, long)]
        output: String,
        /// Override the number of workers
        #[arg(long)]
        workers: Option<usize>,
        /// Ignore cached vectors
        #[arg(long)]
        no_cache: bool,
        /// Output format
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Print the current feature names
    Show {
        /// Write the schema manifest (JSON) to a file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Check a model's feature names against the current schema
    Check {
        /// Schema manifest or JSON array of names
        names: String,
    },
}

#[derive(Clone, Copy, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Data { action } => match action {
            DataCommands::Import { bundle } => commands::data_import(&config, &bundle),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Features { action } => match action {
            FeatureCommands::Game {
                game_id,
                as_of,
                window,
                no_cache,
                injuries,
                format,
            } => commands::features_game(&config, &game_id, as_of, window, no_cache, injuries, format),
            FeatureCommands::Season {
                season,
                output,
                workers,
                no_cache,
                format,
            } => commands::features_season(&config, &season, &output, workers, no_cache, format),
        },
        Commands::Schema { action } => match action {
            SchemaCommands::Show { output } => commands::schema_show(&config, output),
            SchemaCommands::Check { names } => commands::schema_check(&config, &names),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use hoops::data::{Database, SeasonBundle, StatsStore};
    use hoops::features::injury::parse_injury_report;
    use hoops::features::{
        FeatureAggregator, FeatureSchema, MatrixFormat, SchemaManifest, SeasonBatch,
        VectorOptions, SCHEMA_VERSION,
    };
    use hoops::{GameId, HoopsError, TeamId};

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        println!("Created data/ directory");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'hoops data import <bundle.json>' to load games");
        println!("  3. Run 'hoops features game <GAME_ID>' to inspect a feature vector");
        println!("  4. Run 'hoops features season <SEASON> -o matrix.json' to build training data");

        Ok(())
    }

    pub fn data_import(config: &Config, bundle_path: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        println!("Importing {}...", bundle_path);

        let bundle = SeasonBundle::load(bundle_path)?;
        let summary = bundle.import_into(&db)?;

        println!("Imported:");
        println!("  Teams:        {}", summary.teams);
        println!("  Games:        {}", summary.games);
        println!("  Box scores:   {}", summary.box_scores);
        println!("  Player lines: {}", summary.player_lines);
        println!("  Betting lines:{}", summary.betting_lines);

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:           {}", config.data.database_path);
        println!("  Teams:          {}", stats.team_count);
        println!(
            "  Games:          {} ({} finished)",
            stats.game_count, stats.finished_game_count
        );
        println!("  Box scores:     {}", stats.box_score_count);
        println!("  Player lines:   {}", stats.player_line_count);
        println!("  Cached vectors: {}", stats.cached_vector_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_game, stats.latest_game) {
            println!("  Range:          {} to {}", earliest, latest);
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn features_game(
        config: &Config,
        game_id: &str,
        as_of: Option<NaiveDate>,
        window: Option<usize>,
        no_cache: bool,
        injuries: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let game_id = GameId::new(game_id);
        let game = db
            .get_game(&game_id)?
            .ok_or_else(|| HoopsError::GameNotFound(game_id.clone()))?;

        let mut aggregator = FeatureAggregator::new(&db, config.clone());
        // a real-time report changes the inputs, so a cached vector would be stale
        let mut use_cache = !no_cache;
        if let Some(path) = injuries {
            let report = std::fs::read_to_string(&path)?;
            aggregator.set_realtime_injuries(parse_injury_report(&report, &db.get_all_teams()?)?);
            use_cache = false;
        }

        let options = VectorOptions {
            as_of,
            window,
            use_cache,
        };
        let vector =
            aggregator.create_feature_vector(&game_id, game.home_team, game.away_team, &options)?;
        aggregator.clear_realtime_injuries();

        match format {
            OutputFormat::Table => {
                let name = |id: TeamId| -> Result<String> {
                    Ok(db
                        .get_team(id)?
                        .map(|t| t.name)
                        .unwrap_or_else(|| id.to_string()))
                };
                println!(
                    "{}: {} vs {} as of {}",
                    game_id,
                    name(game.home_team)?,
                    name(game.away_team)?,
                    as_of.unwrap_or(game.date)
                );
                println!("───────────────────────────────");
                for (feature, value) in vector.iter() {
                    match value {
                        Some(v) => println!("  {:<36} {:>10.4}", feature, v),
                        None => println!("  {:<36} {:>10}", feature, "null"),
                    }
                }
                println!("───────────────────────────────");
                println!(
                    "  {} features, {} null (schema v{})",
                    vector.len(),
                    vector.null_count(),
                    vector.schema_version()
                );
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "game_id": game_id,
                    "schema_version": vector.schema_version(),
                    "features": vector,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            OutputFormat::Csv => {
                return Err(HoopsError::Parse(
                    "single-game output supports table or json".to_string(),
                ))
            }
        }

        Ok(())
    }

    pub fn features_season(
        config: &Config,
        season: &str,
        output: &str,
        workers: Option<usize>,
        no_cache: bool,
        format: OutputFormat,
    ) -> Result<()> {
        let format = match format {
            OutputFormat::Json => MatrixFormat::Json,
            OutputFormat::Csv => MatrixFormat::Csv,
            OutputFormat::Table => {
                return Err(HoopsError::Parse(
                    "season output supports json or csv".to_string(),
                ))
            }
        };

        let mut batch = SeasonBatch::new(&config.data.database_path, config.clone())
            .with_cache(!no_cache);
        if let Some(w) = workers {
            batch = batch.with_workers(w);
        }

        println!("Building training matrix for {}...", season);
        let matrix = batch.generate(season)?;
        matrix.save(output, format)?;

        println!(
            "Wrote {} games × {} features to {}",
            matrix.len(),
            matrix.feature_names.len(),
            output
        );

        Ok(())
    }

    pub fn schema_show(config: &Config, output: Option<String>) -> Result<()> {
        let schema = FeatureSchema::from_config(&config.features);

        if let Some(path) = output {
            std::fs::write(&path, serde_json::to_string_pretty(&schema.manifest())?)?;
            println!("Wrote schema v{} ({} features) to {}", schema.version(), schema.len(), path);
            return Ok(());
        }

        println!("Feature schema v{}", schema.version());
        println!("───────────────────────────────");
        for (i, spec) in schema.specs().iter().enumerate() {
            println!("  {:>4}  {:<36} {}", i, spec.name, spec.category);
        }
        println!("───────────────────────────────");
        println!("  {} features", schema.len());

        Ok(())
    }

    pub fn schema_check(config: &Config, names_path: &str) -> Result<()> {
        let schema = FeatureSchema::from_config(&config.features);
        let content = std::fs::read_to_string(names_path)?;

        let manifest = match serde_json::from_str::<SchemaManifest>(&content) {
            Ok(m) => m,
            Err(_) => SchemaManifest {
                schema_version: SCHEMA_VERSION,
                windows: Vec::new(),
                feature_names: serde_json::from_str(&content)?,
            },
        };

        schema.ensure_manifest(&manifest)?;
        println!(
            "OK: {} features match schema v{}",
            manifest.feature_names.len(),
            schema.version()
        );

        Ok(())
    }
}
