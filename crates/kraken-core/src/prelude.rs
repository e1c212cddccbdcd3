//! A convenience module that re-exports commonly used items.
//!
//! ```
//! use kraken_core::prelude::*;
//! ```

pub use crate::dispatch::{TaskDispatcher, TaskHandle, TaskRoutes, TaskSignature};
pub use crate::store::{DataStore, MetadataStore, StatisticsUpdate};
pub use crate::types::{
    bfm_model, Bucket, Crawl, CrawlStatus, DocumentFactory, ExecutionToken, FailInfo, HistoricDocument,
    HistoricPayload, PipelineResult, RequestResult, RetryInfo, Series, SlimTarget, Stage,
    StageResult, StageStatistics, Target, TargetFilter, Timestamp, TokenState,
};
pub use crate::util::{add_json_maps, add_option_f64, sanitize_mongo_key};
pub use crate::{BoxError, Error, ErrorKind, ErrorScope, Result};
