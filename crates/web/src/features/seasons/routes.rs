use axum::{
    Router,
    routing::{get, post, put},
};
use storage::Database;

use super::handlers::{get_season_standings, put_season_regattas, recompute_season_standings};

pub fn routes() -> Router<Database> {
    Router::new()
        .route("/:season_id/standings", get(get_season_standings))
        .route("/:season_id/standings/recompute", post(recompute_season_standings))
        .route("/:season_id/regattas", put(put_season_regattas))
}
