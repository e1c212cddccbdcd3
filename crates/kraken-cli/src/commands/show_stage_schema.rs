//! `kraken-cli show-stage-schema` (§6, §10.3): prints a hand-written
//! JSON-Schema-shaped description of the Stage blueprint shape accepted by
//! `setup-series --stage FILE`, produced from the `Stage` type's public
//! fields rather than a schema-derive dependency.

use kraken::Result;
use serde_json::json;

pub fn run() -> Result<()> {
    let schema = json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Stage",
        "type": "object",
        "required": ["name", "request"],
        "properties": {
            "name": {
                "type": "string",
                "description": "Unique within a Crawl's stage list."
            },
            "request": {
                "$ref": "#/$defs/task_signature",
                "description": "Fetches the content this stage processes."
            },
            "pipelines": {
                "type": "array",
                "items": { "$ref": "#/$defs/task_signature" },
                "default": [],
                "description": "Run in order over each RequestResult, accumulated with PipelineResult's addition law."
            },
            "terminators": {
                "type": "array",
                "items": { "$ref": "#/$defs/task_signature" },
                "default": [],
                "description": "Pure predicates over running StageResult; any firing ends this stage for the target."
            },
            "callbacks": {
                "type": "array",
                "items": { "$ref": "#/$defs/task_signature" },
                "default": [],
                "description": "Run once the stage terminates (Target Monitor, Crawl Monitor)."
            },
            "target": {
                "type": ["object", "null"],
                "default": null,
                "description": "Injected per scheduled target by the Scheduler; omit on a Series blueprint."
            },
            "progress": {
                "type": "object",
                "default": {},
                "description": "Running StageResult; omit on a Series blueprint, the Scheduler resets it."
            }
        },
        "$defs": {
            "task_signature": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": { "type": "string", "description": "Dotted task name routed by prefix (request.*, pipeline.*, terminator.*, callback.*)." },
                    "kwargs": { "type": "object", "default": {} }
                }
            }
        }
    });

    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
