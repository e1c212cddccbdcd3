//! `kraken-cli daemon` (§6, §10.4): wires a `Scheduler` with a `StaticAllocator`
//! against an in-memory `MetadataStore`/`TaskDispatcher` pair and drains one
//! Crawl for a Series, printing the scheduler status line after every step.
//!
//! A thin assembly point, not a real deployment: the registered task handlers
//! below only acknowledge receipt, they do not perform requests, run
//! pipelines, or evaluate terminators — those are the operator's own plugins.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Args as ClapArgs;
use kraken::allocator::StaticAllocator;
use kraken::dispatch::memory::{InMemoryTaskDispatcher, TaskHandler};
use kraken::scheduler::{DispatchMode, Scheduler};
use kraken::store::MetadataStore;
use kraken::{Error, ErrorKind, Result};

use crate::store_file;

#[derive(Debug, ClapArgs)]
pub struct Args {
    /// Store id of the Series to run.
    series_id: String,

    /// Resume the Series' most recent unfinished Crawl instead of starting a new one.
    #[arg(long)]
    continue_crawl: bool,

    /// Targets scheduled per allocator batch.
    #[arg(long, default_value_t = 50)]
    step_size: usize,

    /// Minimum wall-clock time between scheduling steps.
    #[arg(long, default_value_t = 0)]
    step_period_millis: u64,
}

struct Ack;

#[async_trait::async_trait]
impl TaskHandler for Ack {
    async fn handle(&self, _kwargs: serde_json::Map<String, serde_json::Value>) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
}

pub async fn run(store_path: &Path, args: Args) -> Result<()> {
    let store = Arc::new(store_file::load(store_path)?);

    let series = store
        .get_series(&args.series_id)
        .await?
        .ok_or_else(|| Error::new(ErrorKind::Validation, format!("series '{}' not found", args.series_id)))?;

    let mut crawl = if args.continue_crawl {
        match series.crawls.last() {
            Some(crawl_id) => {
                let crawl = store
                    .get_crawl(crawl_id)
                    .await?
                    .ok_or_else(|| Error::new(ErrorKind::Store, "series references a missing crawl"))?;
                if crawl.finished.is_some() {
                    store.new_crawl(&args.series_id, next_crawl_id()).await?
                } else {
                    crawl
                }
            }
            None => store.new_crawl(&args.series_id, next_crawl_id()).await?,
        }
    } else {
        store.new_crawl(&args.series_id, next_crawl_id()).await?
    };

    let dispatcher = InMemoryTaskDispatcher::new()
        .with("crawler.multi_stage", Arc::new(Ack))
        .with("crawler.single_stage", Arc::new(Ack));
    let allocator = StaticAllocator::new(store.clone(), args.step_size);
    let mut scheduler = Scheduler::new(
        allocator,
        dispatcher,
        store.clone(),
        args.series_id.clone(),
        Duration::from_millis(args.step_period_millis),
        DispatchMode::MultiStage,
    );

    loop {
        let scheduled = scheduler.step(&mut crawl).await?;
        let status = crawl.status();
        println!(
            "daemon: scheduled={} finished={} retried={} failed={} backpressure={}",
            status.scheduled, status.finished, status.retried, status.failed, status.backpressure
        );
        if scheduled == 0 {
            break;
        }
        store_file::save(store_path, &store)?;
    }

    store.mark_crawl_finished(&crawl.id, kraken::types::Timestamp::now()).await?;
    store_file::save(store_path, &store)?;

    println!("daemon: crawl '{}' drained", crawl.name);
    Ok(())
}

fn next_crawl_id() -> String {
    format!("crawl_{}", uuid::Uuid::new_v4())
}
