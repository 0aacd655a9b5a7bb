use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use storage::{
    Database,
    dto::{
        common::PaginatedResponse,
        standings::{ExportQuery, RecomputeQuery, RecomputeResponse, StandingsFilter},
    },
    models::SeriesStanding,
};
use uuid::Uuid;

use crate::error::WebError;

use super::services;

#[utoipa::path(
    get,
    path = "/api/regattas/{regatta_id}/standings",
    params(
        ("regatta_id" = Uuid, Path, description = "Regatta id"),
        StandingsFilter
    ),
    responses(
        (status = 200, description = "Stored standings of the division", body = PaginatedResponse<SeriesStanding>),
        (status = 400, description = "Invalid query parameters"),
        (status = 404, description = "Regatta not found")
    ),
    tag = "standings"
)]
pub async fn get_standings(
    State(db): State<Database>,
    Path(regatta_id): Path<Uuid>,
    Query(filter): Query<StandingsFilter>,
) -> Result<Response, WebError> {
    filter.validate().map_err(WebError::BadRequest)?;

    let (standings, total_items) = services::list_standings(db.pool(), regatta_id, &filter).await?;

    let response = PaginatedResponse::new(standings, &filter.pagination, total_items);

    Ok(Json(response).into_response())
}

#[utoipa::path(
    post,
    path = "/api/regattas/{regatta_id}/standings/recompute",
    params(
        ("regatta_id" = Uuid, Path, description = "Regatta id"),
        RecomputeQuery
    ),
    responses(
        (status = 200, description = "Standings recomputed; the report lists per-race problems", body = RecomputeResponse),
        (status = 404, description = "Regatta not found"),
        (status = 422, description = "Scoring configuration is invalid")
    ),
    tag = "standings"
)]
pub async fn recompute_standings(
    State(db): State<Database>,
    Path(regatta_id): Path<Uuid>,
    Query(query): Query<RecomputeQuery>,
) -> Result<Response, WebError> {
    let response = services::recompute(db.pool(), regatta_id, &query).await?;

    Ok(Json(response).into_response())
}

#[utoipa::path(
    get,
    path = "/api/regattas/{regatta_id}/standings/export",
    params(
        ("regatta_id" = Uuid, Path, description = "Regatta id"),
        ExportQuery
    ),
    responses(
        (status = 200, description = "Standings rendered as csv, legacy, json or summary", body = String),
        (status = 404, description = "Regatta not found"),
        (status = 422, description = "Scoring configuration is invalid")
    ),
    tag = "standings"
)]
pub async fn export_standings(
    State(db): State<Database>,
    Path(regatta_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, WebError> {
    let body = services::export(db.pool(), regatta_id, query.division.as_deref(), query.format).await?;

    let disposition = format!(
        "attachment; filename=\"standings-{}.{}\"",
        regatta_id,
        query.format.extension()
    );

    Ok((
        [
            (header::CONTENT_TYPE, query.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
