//! The Resource Allocator (C7, §4.10): a lazy sequence of target batches,
//! ordered least-recently-queued first.

mod proportional;
mod static_alloc;
mod uniform;

pub use proportional::ProportionalAllocator;
pub use static_alloc::StaticAllocator;
pub use uniform::UniformAllocator;

use kraken_core::types::{Crawl, Target};
use kraken_core::Result;

/// Emits successive batches of targets to schedule for a Crawl.
///
/// Implementations must never return the same target twice within one drain
/// (Static) or one step (continuous), per §4.10.
#[async_trait::async_trait]
pub trait ResourceAllocator: Send + Sync {
    /// Returns the next batch, or an empty `Vec` once exhausted (Static) —
    /// continuous allocators never exhaust on their own.
    async fn next_batch(&mut self, crawl: &Crawl, series_id: &str) -> Result<Vec<Target>>;

    /// The key this allocator's pacing/queue-order state is scoped to.
    ///
    /// `StaticAllocator` is a per-series, drain-once cursor scoped to
    /// `series_id`; `UniformAllocator`/`ProportionalAllocator` are
    /// continuous and scoped to the Crawl's `name` instead, since a
    /// long-running Crawl may span multiple Series iterations sharing one
    /// bucket-recompute cadence.
    fn queue_key(&self, crawl: &Crawl, series_id: &str) -> String;
}
