use crate::types::{HistoricDocument, HistoricPayload};
use crate::Result;

/// The Data Store collaborator (§1, §6): persists [`HistoricDocument`]s of one
/// concrete payload type `P`, keyed by [`HistoricPayload::primary_key`].
///
/// One `DataStore<P>` per document variant (`Detail`, `Permission`, `Review`,
/// `DataSafety`, ...), matching the original's per-`document_type` collections (§9).
#[async_trait::async_trait]
pub trait DataStore<P: HistoricPayload>: Send + Sync {
    /// Looks up the persisted predecessor for `primary_key`, if any (§4.1 step 1).
    async fn get(&self, primary_key: &str) -> Result<Option<HistoricDocument<P>>>;

    /// Persists `document`, overwriting any predecessor payload (§4.1 step 6).
    async fn put(&self, document: HistoricDocument<P>) -> Result<()>;
}
