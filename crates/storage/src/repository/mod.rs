pub mod regatta;
pub mod season;
pub mod standings;
