//! `kraken-cli setup-series` (§6): creates a Series from stage blueprint
//! files and an optional filter file.

use std::path::{Path, PathBuf};

use clap::Args as ClapArgs;
use kraken::store::MetadataStore;
use kraken::types::{Series, Stage, TargetFilter};
use kraken::{Error, ErrorKind, Result};

use crate::store_file;

#[derive(Debug, ClapArgs)]
pub struct Args {
    /// Series name; also used as the store id.
    name: String,

    #[arg(long)]
    description: Option<String>,

    /// JSON file holding one Stage blueprint (`{name, request, pipelines, terminators, callbacks}`);
    /// may be repeated, in pipeline order.
    #[arg(long = "stage", required = true)]
    stages: Vec<PathBuf>,

    /// JSON file holding a `TargetFilter`; defaults to matching every target.
    #[arg(long)]
    filter: Option<PathBuf>,
}

pub async fn run(store_path: &Path, args: Args) -> Result<()> {
    let mut stages = Vec::with_capacity(args.stages.len());
    for path in &args.stages {
        let bytes = std::fs::read(path)?;
        let stage: Stage = serde_json::from_slice(&bytes).map_err(|error| {
            Error::with_source(ErrorKind::Validation, format!("{} is not a valid Stage blueprint", path.display()), Box::new(error))
        })?;
        stages.push(stage);
    }

    let filter = match &args.filter {
        Some(path) => {
            let bytes = std::fs::read(path)?;
            serde_json::from_slice(&bytes).map_err(|error| {
                Error::with_source(ErrorKind::Validation, format!("{} is not a valid target filter", path.display()), Box::new(error))
            })?
        }
        None => TargetFilter::All,
    };

    let store = store_file::load(store_path)?;
    let mut series = Series::new(args.name.clone(), args.name.clone(), stages, filter);
    series.description = args.description;

    if store.get_series(&series.id).await?.is_some() {
        return Err(Error::new(ErrorKind::Validation, format!("series '{}' already exists", series.id)));
    }

    store.insert_series(series).await?;
    store_file::save(store_path, &store)?;

    println!("setup-series: created series '{}' with {} stage(s)", args.name, args.stages.len());
    Ok(())
}
