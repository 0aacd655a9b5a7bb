pub mod common;
pub mod standings;
