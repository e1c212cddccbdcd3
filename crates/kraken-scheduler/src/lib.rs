#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod allocator;
pub mod callback;
pub mod crawl_task;
pub mod pipeline;
pub mod scheduler;
pub mod spider;
pub mod stage_processor;
pub mod terminator;

#[doc(hidden)]
pub mod prelude;

pub use kraken_core::{Error, ErrorKind, Result};
