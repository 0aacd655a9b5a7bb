use axum::{
    Router,
    routing::{get, post},
};
use storage::Database;

use super::handlers::{export_standings, get_standings, recompute_standings};

pub fn routes() -> Router<Database> {
    Router::new()
        .route("/:regatta_id/standings", get(get_standings))
        .route("/:regatta_id/standings/recompute", post(recompute_standings))
        .route("/:regatta_id/standings/export", get(export_standings))
}
