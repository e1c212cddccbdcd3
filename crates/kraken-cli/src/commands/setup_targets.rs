//! `kraken-cli setup-targets` (§6): bulk-imports Targets from a JSON records
//! file, crossed with one or more languages.

use std::path::{Path, PathBuf};

use clap::Args as ClapArgs;
use kraken::store::MetadataStore;
use kraken::types::Target;
use kraken::{Error, ErrorKind, Result};
use serde_json::{Map, Value};

use crate::store_file;

#[derive(Debug, ClapArgs)]
pub struct Args {
    /// JSON file containing an array of base kwargs objects, one per target identity.
    file: PathBuf,

    /// One or more language codes; each base record is crossed with every language,
    /// merged into the record's kwargs under the `lang` key.
    #[arg(required = true)]
    lang: Vec<String>,

    /// Tag applied to every inserted target; may be repeated.
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// When a target with matching kwargs already exists, merge `--tag` values into
    /// it instead of treating the collision as an error.
    #[arg(long)]
    upsert_tags: bool,

    /// Keep importing past a single record's error instead of aborting the whole run.
    #[arg(long)]
    continue_on_error: bool,

    /// Number of records inserted per progress-reporting chunk.
    #[arg(long, default_value_t = 100)]
    bucket_size: usize,
}

pub async fn run(store_path: &Path, args: Args) -> Result<()> {
    let bytes = std::fs::read(&args.file)?;
    let records: Vec<Map<String, Value>> = serde_json::from_slice(&bytes).map_err(|error| {
        Error::with_source(
            ErrorKind::Validation,
            format!("{} is not a JSON array of objects", args.file.display()),
            Box::new(error),
        )
    })?;

    let store = store_file::load(store_path)?;
    let tags: std::collections::BTreeSet<String> = args.tags.into_iter().collect();

    let mut inserted = 0usize;
    let mut upserted = 0usize;
    let mut errors = 0usize;

    let crossed: Vec<Map<String, Value>> = records
        .into_iter()
        .flat_map(|record| {
            args.lang.iter().map(move |lang| {
                let mut kwargs = record.clone();
                kwargs.insert("lang".to_string(), Value::String(lang.clone()));
                kwargs
            })
        })
        .collect();

    for (index, kwargs) in crossed.into_iter().enumerate() {
        let mut target = Target::new(kwargs.clone());
        target.tags = tags.clone();

        match store.insert_target(target).await {
            Ok(_) => inserted += 1,
            Err(error) if error.kind() == ErrorKind::UniquenessRace && args.upsert_tags => {
                let existing = store.find_target_by_kwargs(&kwargs).await?.ok_or(error)?;
                store.upsert_target_tags(existing.id.as_deref().unwrap_or_default(), tags.clone()).await?;
                upserted += 1;
            }
            Err(error) if args.continue_on_error => {
                eprintln!("warning: skipping record: {error}");
                errors += 1;
            }
            Err(error) => return Err(error),
        }

        if args.bucket_size > 0 && (index + 1) % args.bucket_size == 0 {
            println!("setup-targets: {} processed ({inserted} inserted, {upserted} upserted, {errors} errors)", index + 1);
        }
    }

    store_file::save(store_path, &store)?;
    println!("setup-targets: done — {inserted} inserted, {upserted} upserted, {errors} errors");
    Ok(())
}
