//! Small, dependency-free helpers shared across the engine.

mod mongo_key;
mod pipeline_math;

pub use mongo_key::{join_store_path, sanitize_mongo_key};
pub use pipeline_math::{add_json_maps, add_option_f64};
