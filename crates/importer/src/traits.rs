use crate::legacy::{LegacyReader, LegacyTransformer, LegacyValidator};
use crate::Result;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

pub struct ImportContext {
    pub pool: PgPool,
}

/// A source of regatta results that can be loaded into the database.
#[async_trait::async_trait]
pub trait RegattaImporter: Send + Sync {
    /// Imports from `source` and returns the stored regatta id.
    async fn import(&self, source: &str, context: &ImportContext) -> Result<Uuid>;
}

/// Imports `.blw` files from disk.
pub struct LegacyFileImporter;

#[async_trait::async_trait]
impl RegattaImporter for LegacyFileImporter {
    async fn import(&self, source: &str, context: &ImportContext) -> Result<Uuid> {
        info!("Reading {}", source);
        let content = tokio::fs::read_to_string(source).await?;

        let file = LegacyReader::parse(&content)?;
        let report = LegacyValidator::validate(&file)?;
        report.log_warnings();

        LegacyTransformer::new(&context.pool)
            .import_to_database(&file)
            .await
    }
}
