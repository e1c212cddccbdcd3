pub mod daemon;
pub mod setup_series;
pub mod setup_targets;
pub mod show_stage_schema;
