use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dto::standings::{DivisionRecompute, RecomputeResponse};
use crate::error::{ComputationReport, Result, ScoringError, StorageError};
use crate::models::{SeriesStanding, ScoringConfiguration};
use crate::repository::regatta::RegattaRepository;
use crate::repository::season::SeasonRepository;
use crate::repository::standings::StandingsRepository;
use crate::services::scoring::{
    SeasonComputation, SeasonInput, SeasonRegattaInput, SeriesComputation,
    aggregate_season_standings, compute_series_standings,
};

/// Result of a compute-and-store run.
#[derive(Debug, Clone)]
pub struct Recomputed<T> {
    pub computation: T,
    /// `false` when errors were reported and partial results were not allowed.
    pub persisted: bool,
}

/// Loads one regatta division and computes its standings without writing anything.
pub async fn compute_series_for_regatta(
    pool: &PgPool,
    regatta_id: Uuid,
    division: Option<&str>,
) -> Result<SeriesComputation> {
    let repo = RegattaRepository::new(pool);
    let input = repo.load_series_input(regatta_id, division).await?;

    let computation = compute_series_standings(&input)?;
    computation.report.log();

    Ok(computation)
}

/// Computes one regatta division and replaces its stored standings.
///
/// With reported errors the standings are only written when `allow_partial` is set.
/// A configuration error aborts before anything is written.
pub async fn compute_and_store_series_standings(
    pool: &PgPool,
    regatta_id: Uuid,
    division: Option<&str>,
    allow_partial: bool,
) -> Result<Recomputed<SeriesComputation>> {
    let computation = compute_series_for_regatta(pool, regatta_id, division).await?;

    if computation.report.has_errors() && !allow_partial {
        warn!(
            "Regatta {} division '{}' has {} scoring errors; standings not stored",
            regatta_id,
            division.unwrap_or(""),
            computation.report.errors.len()
        );
        return Ok(Recomputed {
            computation,
            persisted: false,
        });
    }

    StandingsRepository::new(pool)
        .replace_series_standings(regatta_id, division, &computation.standings)
        .await?;

    Ok(Recomputed {
        computation,
        persisted: true,
    })
}

/// Recomputes one division, or every division of the regatta when `division` is `None`.
pub async fn recompute_regatta(
    pool: &PgPool,
    regatta_id: Uuid,
    division: Option<&str>,
    allow_partial: bool,
) -> Result<RecomputeResponse> {
    let divisions = match division {
        Some(division) => vec![Some(division.to_string())],
        None => RegattaRepository::new(pool).list_divisions(regatta_id).await?,
    };

    let mut report = ComputationReport::default();
    let mut summaries = Vec::with_capacity(divisions.len());

    for division in divisions {
        let recomputed =
            compute_and_store_series_standings(pool, regatta_id, division.as_deref(), allow_partial)
                .await?;

        summaries.push(DivisionRecompute {
            division,
            standings: recomputed.computation.standings.len(),
            persisted: recomputed.persisted,
        });
        report.merge(recomputed.computation.report);
    }

    info!(
        "Recomputed {} division(s) of regatta {}",
        summaries.len(),
        regatta_id
    );

    Ok(RecomputeResponse {
        id: regatta_id,
        divisions: summaries,
        report,
    })
}

/// Fresh standings for every division of a regatta. Only a configuration error is
/// returned as `Err` inside the `Ok`; database failures propagate.
async fn regatta_standings(
    pool: &PgPool,
    regatta_id: Uuid,
) -> Result<std::result::Result<(Vec<SeriesStanding>, ComputationReport), ScoringError>> {
    let divisions = RegattaRepository::new(pool).list_divisions(regatta_id).await?;

    let mut standings = Vec::new();
    let mut report = ComputationReport::default();

    for division in divisions {
        match compute_series_for_regatta(pool, regatta_id, division.as_deref()).await {
            Ok(computation) => {
                standings.extend(computation.standings);
                report.merge(computation.report);
            }
            Err(StorageError::Scoring(err)) => return Ok(Err(err)),
            Err(err) => return Err(err),
        }
    }

    Ok(Ok((standings, report)))
}

/// Recomputes every member regatta (reads only) and aggregates the season.
pub async fn compute_season(pool: &PgPool, season_id: Uuid) -> Result<SeasonComputation> {
    let repo = SeasonRepository::new(pool);
    repo.get_season(season_id).await?;

    let config: Option<ScoringConfiguration> = repo.get_scoring_configuration(season_id).await?;
    let memberships = repo.list_season_regattas(season_id).await?;

    let mut regatta_reports = ComputationReport::default();
    let mut regattas = Vec::with_capacity(memberships.len());

    for membership in memberships {
        let standings = match regatta_standings(pool, membership.regatta_id).await? {
            Ok((standings, report)) => {
                regatta_reports.merge(report);
                Ok(standings)
            }
            Err(err) => Err(err),
        };

        regattas.push(SeasonRegattaInput {
            season_regatta: membership,
            standings,
        });
    }

    let mut computation = aggregate_season_standings(&SeasonInput {
        season_id,
        config,
        regattas,
    })?;
    computation.report.merge(regatta_reports);
    computation.report.log();

    Ok(computation)
}

/// Aggregates the season and replaces its stored standings in one transaction.
pub async fn compute_and_store_season_standings(
    pool: &PgPool,
    season_id: Uuid,
    allow_partial: bool,
) -> Result<Recomputed<SeasonComputation>> {
    let computation = compute_season(pool, season_id).await?;

    if computation.report.has_errors() && !allow_partial {
        warn!(
            "Season {} has {} scoring errors; standings not stored",
            season_id,
            computation.report.errors.len()
        );
        return Ok(Recomputed {
            computation,
            persisted: false,
        });
    }

    StandingsRepository::new(pool)
        .replace_season_standings(season_id, &computation.standings)
        .await?;

    Ok(Recomputed {
        computation,
        persisted: true,
    })
}
