//! A convenience module that re-exports commonly used items.
//!
//! ```
//! use kraken_scheduler::prelude::*;
//! ```

pub use crate::allocator::{ProportionalAllocator, ResourceAllocator, StaticAllocator, UniformAllocator};
pub use crate::callback::{Callback, CallbackContext, CallbackRegistry};
pub use crate::crawl_task::CrawlTask;
pub use crate::pipeline::data_storage::DataStoragePipeline;
pub use crate::pipeline::target_discovery::TargetDiscoveryPipeline;
pub use crate::pipeline::{Pipeline, PipelineRegistry};
pub use crate::scheduler::{DispatchMode, Scheduler};
pub use crate::spider::Spider;
pub use crate::stage_processor::{NullProgressSink, ProgressSink, StageProcessor};
pub use crate::terminator::Terminator;
pub use crate::{Error, ErrorKind, Result};
