pub mod seasons;
pub mod standings;

use axum::Router;
use storage::Database;

pub fn api_routes() -> Router<Database> {
    Router::new()
        .nest("/regattas", standings::routes::routes())
        .nest("/seasons", seasons::routes::routes())
}
