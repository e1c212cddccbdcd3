//! The `MetadataStore` and `DataStore` collaborator contracts (C1 sibling, §6).
//!
//! The engine never opens a database connection itself — it hands atomic,
//! field-level operations to a caller-supplied [`MetadataStore`] (Targets,
//! Series, Crawls, ExecutionTokens) and [`DataStore`] (HistoricDocuments).

mod data;
mod metadata;
pub mod memory;

pub use data::DataStore;
pub use metadata::{MetadataStore, StatisticsUpdate};
