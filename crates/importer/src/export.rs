use sqlx::PgPool;
use storage::error::ComputationReport;
use storage::models::SeriesStanding;
use storage::repository::regatta::RegattaRepository;
use storage::repository::standings::StandingsRepository;
use storage::services::scoring::{SeriesInput, compute_series_standings};
use storage::services::standings_computation::compute_season;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Result;
use crate::formats::{ExportFormat, export_csv, export_season_json, export_series_json, summarize};
use crate::legacy::{LegacyEvent, LegacyFile, LegacyWriter};

/// Renders computed standings in the requested format. `input` is only read by the
/// legacy format, which carries the raw results next to the points.
pub fn render_series(
    format: ExportFormat,
    event: LegacyEvent,
    input: &SeriesInput,
    standings: &[SeriesStanding],
    report: Option<&ComputationReport>,
) -> Result<String> {
    let rendered = match format {
        ExportFormat::Csv => export_csv(standings),
        ExportFormat::Json => {
            export_series_json(input.regatta_id, input.division.as_deref(), standings, report)?
        }
        ExportFormat::Summary => {
            let mut text = format!("{}\n", event.name);
            text.push_str(&summarize(standings).to_string());
            text.push('\n');
            text
        }
        ExportFormat::Legacy => LegacyWriter::write(&LegacyFile::from_series(event, input, standings)),
    };
    Ok(rendered)
}

/// Exports one regatta division. Stored standings are used when present; otherwise
/// the division is computed on the fly without being stored.
pub async fn export_regatta(
    pool: &PgPool,
    regatta_id: Uuid,
    division: Option<&str>,
    format: ExportFormat,
) -> Result<String> {
    let repo = RegattaRepository::new(pool);
    let regatta = repo.get_regatta(regatta_id).await?;
    let input = repo.load_series_input(regatta_id, division).await?;

    let stored: Vec<SeriesStanding> = StandingsRepository::new(pool)
        .all_series_standings(regatta_id)
        .await?
        .into_iter()
        .filter(|s| s.division.as_deref() == division)
        .collect();

    let (standings, report) = if stored.is_empty() {
        debug!("No stored standings for regatta {}; computing", regatta_id);
        let computation = compute_series_standings(&input)?;
        computation.report.log();
        (computation.standings, Some(computation.report))
    } else {
        (stored, None)
    };

    let mut event = LegacyEvent::from(&regatta);
    event.division = division.map(str::to_string);

    info!(
        "Exporting {} standings of regatta {} as {}",
        standings.len(),
        regatta.slug,
        format.extension()
    );
    render_series(format, event, &input, &standings, report.as_ref())
}

/// Season standings as JSON, freshly aggregated.
pub async fn export_season(pool: &PgPool, season_id: Uuid) -> Result<String> {
    let computation = compute_season(pool, season_id).await?;
    export_season_json(season_id, &computation.standings, Some(&computation.report))
}
