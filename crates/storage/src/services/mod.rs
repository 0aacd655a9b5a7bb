pub mod scoring;
pub mod standings_computation;
