use anyhow::Context;
use axum::Router;
use storage::Database;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod features;

use config::Config;

#[derive(OpenApi)]
#[openapi(
    paths(
        features::standings::handlers::get_standings,
        features::standings::handlers::recompute_standings,
        features::standings::handlers::export_standings,
        features::seasons::handlers::get_season_standings,
        features::seasons::handlers::recompute_season_standings,
        features::seasons::handlers::put_season_regattas,
    ),
    components(
        schemas(
            storage::dto::common::PaginationMeta,
            storage::dto::standings::RecomputeResponse,
            storage::dto::standings::DivisionRecompute,
            storage::dto::standings::ExportFormat,
            storage::dto::standings::SeasonCompositionRequest,
            storage::dto::standings::SeasonRegattaRequest,
            storage::error::ComputationReport,
            storage::error::ScoringError,
            storage::models::Entry,
            storage::models::FinishOutcome,
            storage::models::ScoringCode,
            storage::models::RaceScore,
            storage::models::SeriesStanding,
            storage::models::SeasonRegatta,
            storage::models::SeasonRegattaResult,
            storage::models::SeasonRaceResult,
            storage::models::SeasonStanding,
        )
    ),
    tags(
        (name = "standings", description = "Regatta series standings"),
        (name = "seasons", description = "Season standings and composition"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting regatta standings API");

    let config = Config::from_env().context("Failed to load API configuration")?;
    tracing::info!("Configuration loaded successfully");

    tracing::info!(
        "Connecting to database at: {}",
        config
            .database_url
            .split('@')
            .next_back()
            .unwrap_or("unknown")
    );
    let db = Database::new(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations");
    db.run_migrations()
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations completed successfully");

    let bind_address = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server at http://{}", bind_address);
    tracing::info!(
        "Swagger UI available at http://{}/swagger-ui/",
        bind_address
    );

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", features::api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
        .with_state(db);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    axum::serve(listener, app).await?;

    Ok(())
}
