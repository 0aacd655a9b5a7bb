use serde::Serialize;
use storage::error::ComputationReport;
use storage::models::{SeasonStanding, SeriesStanding};
use uuid::Uuid;

use crate::Result;

#[derive(Debug, Serialize)]
struct SeriesDocument<'a> {
    regatta_id: Uuid,
    division: Option<&'a str>,
    standings: &'a [SeriesStanding],
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a ComputationReport>,
}

#[derive(Debug, Serialize)]
struct SeasonDocument<'a> {
    season_id: Uuid,
    standings: &'a [SeasonStanding],
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a ComputationReport>,
}

pub fn export_series_json(
    regatta_id: Uuid,
    division: Option<&str>,
    standings: &[SeriesStanding],
    report: Option<&ComputationReport>,
) -> Result<String> {
    let document = SeriesDocument {
        regatta_id,
        division,
        standings,
        report,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn export_season_json(
    season_id: Uuid,
    standings: &[SeasonStanding],
    report: Option<&ComputationReport>,
) -> Result<String> {
    let document = SeasonDocument {
        season_id,
        standings,
        report,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}
