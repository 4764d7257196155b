//! Plan command implementation.

use super::{action_name, load_source, print_item, print_summary, Remote};
use fleetsync_engine::{build_plan, DryRunSwitch, EngineConfig, PlanSummary};
use fleetsync_model::{Classification, Endpoint, SyncItem};
use fleetsync_store::load_snapshot;
use serde::Serialize;
use std::error::Error;
use std::path::Path;

/// Plan as printed in JSON format.
#[derive(Debug, Serialize)]
pub struct PlanReport {
    /// Counts.
    pub summary: PlanSummary,
    /// Per-item decisions.
    pub items: Vec<PlannedItem>,
}

/// One planned item.
#[derive(Debug, Serialize)]
pub struct PlannedItem {
    /// Source record id.
    pub source_id: String,
    /// Display name.
    pub name: String,
    /// Derived category.
    pub classification: Classification,
    /// Target endpoint.
    pub endpoint: Endpoint,
    /// Decided action.
    pub action: &'static str,
    /// Matched destination record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<String>,
    /// Fields that would be written.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changed_fields: Vec<String>,
}

impl From<&SyncItem> for PlannedItem {
    fn from(item: &SyncItem) -> Self {
        Self {
            source_id: item.source.id.clone(),
            name: item.display_name().to_string(),
            classification: item.classification,
            endpoint: item.mapped.endpoint,
            action: action_name(item.action),
            destination_id: item.matched.destination_id.clone(),
            changed_fields: item.changed_fields(),
        }
    }
}

/// Runs the plan command. Nothing is written to the destination.
pub fn run(
    remote: &Remote,
    source: &Path,
    snapshot: Option<&Path>,
    format: &str,
) -> Result<(), Box<dyn Error>> {
    let config = EngineConfig::new();
    let records = load_source(source, &config)?;

    let items = match snapshot {
        Some(path) => build_plan(&records, &load_snapshot(path)?),
        None => {
            let executor = remote.executor(DryRunSwitch::new(true), config)?;
            executor.plan(&records)?
        }
    };
    let summary = PlanSummary::from_items(&items);

    match format {
        "json" => {
            let report = PlanReport {
                summary,
                items: items.iter().map(PlannedItem::from).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_summary(&summary);
            println!();
            println!("Items:");
            for item in &items {
                print_item(item);
            }
        }
    }

    Ok(())
}
