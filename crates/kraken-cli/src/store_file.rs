//! Loads and saves an [`InMemoryMetadataStore`] to a local JSON file, giving
//! the otherwise single-process store cross-invocation durability for this
//! CLI's `setup-targets` / `setup-series` / `daemon` sequence (§10.4).

use std::path::Path;

use kraken::store::memory::{InMemoryMetadataStore, MetadataSnapshot};
use kraken::{Error, ErrorKind, Result};

pub fn load(path: &Path) -> Result<InMemoryMetadataStore> {
    if !path.exists() {
        return Ok(InMemoryMetadataStore::new());
    }
    let bytes = std::fs::read(path)?;
    let snapshot: MetadataSnapshot = serde_json::from_slice(&bytes)
        .map_err(|error| Error::with_source(ErrorKind::Validation, format!("malformed store file {}", path.display()), Box::new(error)))?;
    Ok(InMemoryMetadataStore::from_snapshot(snapshot))
}

pub fn save(path: &Path, store: &InMemoryMetadataStore) -> Result<()> {
    let snapshot = store.snapshot();
    let bytes = serde_json::to_vec_pretty(&snapshot)?;
    std::fs::write(path, bytes)?;
    Ok(())
}
