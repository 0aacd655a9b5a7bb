use clap::{Parser, Subcommand, ValueEnum};
use importer::{
    ImportContext, LegacyFileImporter, LegacyReader, LegacyValidator, RegattaImporter,
    export_regatta, export_season, formats::ExportFormat, render_series,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::path::{Path, PathBuf};
use storage::services::scoring::compute_series_standings;
use storage::services::standings_computation::{
    compute_and_store_season_standings, recompute_regatta,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "regatta")]
#[command(about = "Regatta scoring, import and export", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Legacy,
    Json,
    Summary,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => ExportFormat::Csv,
            Format::Legacy => ExportFormat::Legacy,
            Format::Json => ExportFormat::Json,
            Format::Summary => ExportFormat::Summary,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Score a legacy file without touching the database.
    Score {
        file: PathBuf,

        #[arg(long, value_enum, default_value = "summary")]
        format: Format,

        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Import a legacy file, or every `.blw` file in a directory.
    Import {
        path: PathBuf,

        #[arg(long)]
        validate_only: bool,

        /// Recompute and store standings after importing.
        #[arg(long)]
        recompute: bool,
    },
    Export {
        #[arg(long)]
        regatta: Option<Uuid>,

        #[arg(long, conflicts_with = "regatta")]
        season: Option<Uuid>,

        #[arg(long)]
        division: Option<String>,

        #[arg(long, value_enum, default_value = "csv")]
        format: Format,

        #[arg(long)]
        output: Option<PathBuf>,
    },
    RecomputeSeries {
        #[arg(long)]
        regatta: Uuid,

        /// Only this division; every division when omitted.
        #[arg(long)]
        division: Option<String>,

        #[arg(long)]
        allow_partial: bool,
    },
    RecomputeSeason {
        #[arg(long)]
        season: Uuid,

        #[arg(long)]
        allow_partial: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("regatta={},importer={},storage={}", log_level, log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let database_url = cli.database_url.as_deref();

    match cli.command {
        Commands::Score {
            file,
            format,
            output,
        } => {
            handle_score(&file, format.into(), output.as_deref()).await?;
        }
        Commands::Import {
            path,
            validate_only,
            recompute,
        } => {
            handle_import(&path, validate_only, recompute, database_url).await?;
        }
        Commands::Export {
            regatta,
            season,
            division,
            format,
            output,
        } => {
            let pool = connect(database_url).await?;
            let rendered = match (regatta, season) {
                (Some(regatta_id), _) => {
                    export_regatta(&pool, regatta_id, division.as_deref(), format.into()).await?
                }
                (None, Some(season_id)) => export_season(&pool, season_id).await?,
                (None, None) => return Err("Either --regatta or --season is required".into()),
            };
            write_output(&rendered, output.as_deref()).await?;
        }
        Commands::RecomputeSeries {
            regatta,
            division,
            allow_partial,
        } => {
            let pool = connect(database_url).await?;
            let response =
                recompute_regatta(&pool, regatta, division.as_deref(), allow_partial).await?;

            for division in &response.divisions {
                tracing::info!(
                    "Division '{}': {} standings{}",
                    division.division.as_deref().unwrap_or(""),
                    division.standings,
                    if division.persisted { "" } else { " (not stored)" }
                );
            }
            report_errors(&response.report)?;
        }
        Commands::RecomputeSeason {
            season,
            allow_partial,
        } => {
            let pool = connect(database_url).await?;
            let recomputed = compute_and_store_season_standings(&pool, season, allow_partial).await?;

            tracing::info!(
                "Season {}: {} standings{}",
                season,
                recomputed.computation.standings.len(),
                if recomputed.persisted { "" } else { " (not stored)" }
            );
            report_errors(&recomputed.computation.report)?;
        }
    }

    Ok(())
}

async fn connect(database_url: Option<&str>) -> Result<PgPool, Box<dyn std::error::Error>> {
    let database_url = database_url.ok_or("DATABASE_URL is required for this command")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

async fn write_output(
    rendered: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            tokio::fs::write(path, rendered).await?;
            tracing::info!("Written to: {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn report_errors(report: &storage::error::ComputationReport) -> Result<(), Box<dyn std::error::Error>> {
    if report.has_errors() {
        for error in &report.errors {
            tracing::error!("  {}", error);
        }
        return Err(format!("{} scoring error(s) reported", report.errors.len()).into());
    }
    Ok(())
}

async fn handle_score(
    file: &Path,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Loading legacy file from: {}", file.display());
    let content = tokio::fs::read_to_string(file).await?;
    let legacy = LegacyReader::parse(&content)?;

    let validation_report = LegacyValidator::validate(&legacy)?;
    validation_report.log_warnings();

    let input = legacy.to_series_input(Uuid::nil());
    let computation = compute_series_standings(&input)?;
    computation.report.log();
    for error in &computation.report.errors {
        tracing::error!("  {}", error);
    }

    let rendered = render_series(
        format,
        legacy.event.clone(),
        &input,
        &computation.standings,
        Some(&computation.report),
    )?;
    write_output(&rendered, output).await
}

async fn handle_import(
    path: &Path,
    validate_only: bool,
    recompute: bool,
    database_url: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = collect_files(path).await?;
    if files.is_empty() {
        tracing::warn!("No .blw files found in {}", path.display());
        return Ok(());
    }

    let context = if validate_only {
        None
    } else {
        Some(ImportContext {
            pool: connect(database_url).await?,
        })
    };

    let mut success_count = 0;
    let mut error_count = 0;

    for (idx, file) in files.iter().enumerate() {
        tracing::info!("[{}/{}] Processing: {}", idx + 1, files.len(), file.display());

        match process_file(file, context.as_ref(), recompute).await {
            Ok(()) => {
                success_count += 1;
                tracing::info!("  Success");
            }
            Err(e) => {
                error_count += 1;
                tracing::error!("  Error: {}", e);
            }
        }
    }

    tracing::info!("Summary: {} succeeded, {} failed", success_count, error_count);

    if error_count > 0 {
        return Err(format!("{} file(s) failed to import", error_count).into());
    }

    Ok(())
}

async fn collect_files(path: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if !tokio::fs::metadata(path).await?.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file = entry.path();
        if file.extension().is_some_and(|ext| ext == "blw") {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

async fn process_file(
    file: &Path,
    context: Option<&ImportContext>,
    recompute: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(context) = context else {
        let content = tokio::fs::read_to_string(file).await?;
        let legacy = LegacyReader::parse(&content)?;
        LegacyValidator::validate(&legacy)?.log_warnings();
        return Ok(());
    };

    let source = file.to_string_lossy();
    let regatta_id = LegacyFileImporter.import(&source, context).await?;
    tracing::info!("  Regatta id: {}", regatta_id);

    if recompute {
        let response = recompute_regatta(&context.pool, regatta_id, None, false).await?;
        report_errors(&response.report)?;
    }

    Ok(())
}
