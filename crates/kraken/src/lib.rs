#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

#[doc(no_inline)]
pub use kraken_core::{async_trait, dispatch, store, types, util, BoxError, Error, ErrorKind, ErrorScope, Result};
#[doc(no_inline)]
pub use kraken_scheduler::{allocator, callback, crawl_task, pipeline, spider, stage_processor, terminator};

pub use kraken_scheduler::scheduler::{self, DispatchMode, Scheduler};

#[doc(hidden)]
pub mod prelude;
