pub mod error;
pub mod export;
pub mod formats;
pub mod legacy;
pub mod traits;

pub use error::{ImporterError, Result};
pub use export::{export_regatta, export_season, render_series};
pub use legacy::{LegacyFile, LegacyReader, LegacyValidator, LegacyWriter};
pub use traits::{ImportContext, LegacyFileImporter, RegattaImporter};
