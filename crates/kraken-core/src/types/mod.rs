//! Data model shared by the scheduling, execution and historisation engine.

mod bucket;
mod crawl;
mod execution_token;
mod filter;
mod historic_document;
mod pipeline_result;
mod request_result;
mod series;
mod slim_target;
mod stage;
mod target;

pub use bucket::Bucket;
pub use crawl::{Crawl, CrawlStatus};
pub use execution_token::{ExecutionToken, FailInfo, RetryInfo, TokenState};
pub use filter::TargetFilter;
pub use historic_document::{
    bfm_model, DocumentFactory, HistoricDocument, HistoricPayload, Patch, Witness, CFM_MAX_AGE_DAYS,
};
pub use pipeline_result::PipelineResult;
pub use request_result::RequestResult;
pub use series::Series;
pub use slim_target::SlimTarget;
pub use stage::{Stage, StageResult};
pub use target::{StageStatistics, StageStatisticsSnapshot, Target};

pub use crate::time::Timestamp;
