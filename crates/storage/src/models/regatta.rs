use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Regatta {
    pub regatta_id: Uuid,
    pub name: String,
    pub slug: String,
    pub venue: Option<String>,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Season {
    pub season_id: Uuid,
    pub name: String,
    pub year: i32,
    pub created_at: chrono::NaiveDateTime,
}
