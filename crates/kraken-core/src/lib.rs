#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod dispatch;
mod error;
pub mod store;
mod time;
pub mod types;
pub mod util;

#[doc(hidden)]
pub mod prelude;

#[doc(no_inline)]
pub use async_trait::async_trait;

pub use crate::error::{BoxError, Error, ErrorKind, ErrorScope};

/// Specialized [`Result`] type used throughout the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Tracing target for historic-document-related events.
#[cfg(feature = "tracing")]
pub(crate) const TRACING_TARGET_HISTORY: &str = "kraken_core::historic_document";
