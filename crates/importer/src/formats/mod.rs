pub mod csv;
pub mod json;
pub mod summary;

pub use csv::export_csv;
pub use json::{export_season_json, export_series_json};
pub use storage::dto::standings::ExportFormat;
pub use summary::{StandingsSummary, summarize};
