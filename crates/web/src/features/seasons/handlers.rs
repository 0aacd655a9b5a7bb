use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use storage::{
    Database,
    dto::{
        common::PaginatedResponse,
        standings::{
            RecomputeQuery, RecomputeResponse, SeasonCompositionRequest, StandingsFilter,
        },
    },
    models::{SeasonRegatta, SeasonStanding},
};
use uuid::Uuid;
use validator::Validate;

use crate::error::WebError;

use super::services;

#[utoipa::path(
    get,
    path = "/api/seasons/{season_id}/standings",
    params(
        ("season_id" = Uuid, Path, description = "Season id"),
        StandingsFilter
    ),
    responses(
        (status = 200, description = "Stored season standings of the division", body = PaginatedResponse<SeasonStanding>),
        (status = 400, description = "Invalid query parameters"),
        (status = 404, description = "Season not found")
    ),
    tag = "seasons"
)]
pub async fn get_season_standings(
    State(db): State<Database>,
    Path(season_id): Path<Uuid>,
    Query(filter): Query<StandingsFilter>,
) -> Result<Response, WebError> {
    filter.validate().map_err(WebError::BadRequest)?;

    let (standings, total_items) = services::list_standings(db.pool(), season_id, &filter).await?;

    let response = PaginatedResponse::new(standings, &filter.pagination, total_items);

    Ok(Json(response).into_response())
}

#[utoipa::path(
    post,
    path = "/api/seasons/{season_id}/standings/recompute",
    params(
        ("season_id" = Uuid, Path, description = "Season id"),
        RecomputeQuery
    ),
    responses(
        (status = 200, description = "Season standings recomputed", body = RecomputeResponse),
        (status = 404, description = "Season not found"),
        (status = 422, description = "Season scoring configuration is invalid")
    ),
    tag = "seasons"
)]
pub async fn recompute_season_standings(
    State(db): State<Database>,
    Path(season_id): Path<Uuid>,
    Query(query): Query<RecomputeQuery>,
) -> Result<Response, WebError> {
    if query.division.is_some() {
        return Err(WebError::BadRequest(
            "season recompute always covers every division".to_string(),
        ));
    }

    let response = services::recompute(db.pool(), season_id, query.allow_partial).await?;

    Ok(Json(response).into_response())
}

#[utoipa::path(
    put,
    path = "/api/seasons/{season_id}/regattas",
    params(
        ("season_id" = Uuid, Path, description = "Season id")
    ),
    request_body = SeasonCompositionRequest,
    responses(
        (status = 200, description = "Season composition replaced", body = Vec<SeasonRegatta>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Season not found"),
        (status = 409, description = "Unknown or duplicated regatta")
    ),
    tag = "seasons"
)]
pub async fn put_season_regattas(
    State(db): State<Database>,
    Path(season_id): Path<Uuid>,
    Json(request): Json<SeasonCompositionRequest>,
) -> Result<Response, WebError> {
    request.validate()?;

    let regattas = services::replace_composition(db.pool(), season_id, &request).await?;

    Ok(Json(regattas).into_response())
}
