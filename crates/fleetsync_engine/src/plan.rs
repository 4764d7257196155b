//! Building sync items: classify, map, match and diff.

use crate::classifier::classify;
use crate::diff::diff;
use crate::executor::RunOptions;
use crate::mapper::map_record;
use crate::matcher::Matcher;
use fleetsync_model::{
    Classification, DestinationRecord, Endpoint, SourceRecord, SyncAction, SyncItem,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Runs every source record through the pipeline, in source order.
///
/// Matching consumes the snapshot as it goes, so the same destination record
/// is never bound to two items.
pub fn build_plan(records: &[SourceRecord], snapshot: &[DestinationRecord]) -> Vec<SyncItem> {
    let mut matcher = Matcher::new(snapshot);

    records
        .iter()
        .map(|record| {
            let classification = classify(record);
            let mapped = map_record(record, classification);
            let (matched, destination) = matcher.match_record(&record.id, &mapped, classification);
            let (verdicts, action) = diff(&mapped, destination);

            debug!(
                source_id = %record.id,
                %classification,
                endpoint = %mapped.endpoint,
                method = ?matched.method,
                ?action,
                "planned item"
            );

            SyncItem {
                source: record.clone(),
                classification,
                mapped,
                matched,
                verdicts,
                action,
            }
        })
        .collect()
}

/// Counts of planned items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// Number of items.
    pub total: usize,
    /// Items per decided action.
    pub by_action: BTreeMap<SyncAction, usize>,
    /// Items per classification.
    pub by_classification: BTreeMap<Classification, usize>,
    /// Items per destination endpoint.
    pub by_endpoint: BTreeMap<Endpoint, usize>,
}

impl PlanSummary {
    /// Summarizes a plan.
    pub fn from_items(items: &[SyncItem]) -> Self {
        Self::tally(items, |item| item.action)
    }

    /// Summarizes what a run with `options` will actually do: unselected
    /// items and, under create-only, updates count as skips.
    pub fn for_run(items: &[SyncItem], options: &RunOptions) -> Self {
        Self::tally(items, |item| options.effective_action(item).0)
    }

    fn tally(items: &[SyncItem], action_of: impl Fn(&SyncItem) -> SyncAction) -> Self {
        let mut summary = Self {
            total: items.len(),
            ..Self::default()
        };
        for item in items {
            *summary.by_action.entry(action_of(item)).or_default() += 1;
            *summary
                .by_classification
                .entry(item.classification)
                .or_default() += 1;
            *summary.by_endpoint.entry(item.mapped.endpoint).or_default() += 1;
        }
        summary
    }

    fn count(&self, action: SyncAction) -> usize {
        self.by_action.get(&action).copied().unwrap_or(0)
    }

    /// Planned creates.
    pub fn creates(&self) -> usize {
        self.count(SyncAction::Create)
    }

    /// Planned updates.
    pub fn updates(&self) -> usize {
        self.count(SyncAction::Update)
    }

    /// Planned skips.
    pub fn skips(&self) -> usize {
        self.count(SyncAction::Skip)
    }

    /// Returns true if the plan writes nothing.
    pub fn is_noop(&self) -> bool {
        self.creates() == 0 && self.updates() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsync_model::{MatchMethod, NetworkAdapter};

    fn laptop(id: &str, host: &str, serial: &str) -> SourceRecord {
        SourceRecord::new(id, host)
            .with_kind("Laptop")
            .with_serial(serial)
            .with_model("Latitude 7440")
            .with_adapter(NetworkAdapter::new("10.1.0.5"))
    }

    #[test]
    fn unmatched_records_plan_creates() {
        let items = build_plan(&[laptop("1", "lt-1", "SN1")], &[]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].action, SyncAction::Create);
        assert_eq!(items[0].matched.method, MatchMethod::NoMatch);
        assert_eq!(items[0].classification, Classification::Laptop);
        assert_eq!(items[0].mapped.endpoint, Endpoint::Workstations);
    }

    #[test]
    fn snapshot_record_is_claimed_once() {
        let snapshot = vec![DestinationRecord::new("d1", "LT-1")];
        let records = [laptop("1", "lt-1", "SN1"), laptop("2", "lt-1", "SN2")];
        let items = build_plan(&records, &snapshot);

        assert_eq!(items[0].matched.destination_id.as_deref(), Some("d1"));
        assert_eq!(items[0].action, SyncAction::Update);
        assert!(!items[1].matched.is_matched());
        assert_eq!(items[1].action, SyncAction::Create);
    }

    #[test]
    fn plan_preserves_source_order() {
        let records: Vec<_> = (0..5)
            .map(|i| laptop(&i.to_string(), &format!("lt-{i}"), &format!("SN{i}")))
            .collect();
        let ids: Vec<_> = build_plan(&records, &[])
            .into_iter()
            .map(|item| item.source.id)
            .collect();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn summary_counts() {
        let snapshot = vec![DestinationRecord::new("d1", "lt-1")];
        let records = [
            laptop("1", "lt-1", "SN1"),
            laptop("2", "lt-2", "SN2"),
            SourceRecord::new("3", "sw-1").with_kind("Network Switch"),
        ];
        let summary = PlanSummary::from_items(&build_plan(&records, &snapshot));

        assert_eq!(summary.total, 3);
        assert_eq!(summary.creates(), 2);
        assert_eq!(summary.updates(), 1);
        assert_eq!(summary.skips(), 0);
        assert_eq!(summary.by_endpoint.get(&Endpoint::Switches), Some(&1));
        assert_eq!(summary.by_classification.get(&Classification::Laptop), Some(&2));
        assert!(!summary.is_noop());
    }

    #[test]
    fn run_summary_follows_options() {
        let snapshot = vec![DestinationRecord::new("d1", "lt-1")];
        let records = [laptop("1", "lt-1", "SN1"), laptop("2", "lt-2", "SN2")];
        let items = build_plan(&records, &snapshot);
        assert_eq!(items[0].action, SyncAction::Update);

        let create_only = PlanSummary::for_run(&items, &RunOptions::new().with_create_only(true));
        assert_eq!((create_only.creates(), create_only.updates()), (1, 0));
        assert_eq!(create_only.skips(), 1);

        let only_synced = RunOptions::new()
            .with_create_only(true)
            .with_selection(crate::executor::Selection::from_ids(["1"]));
        let summary = PlanSummary::for_run(&items, &only_synced);
        assert!(summary.is_noop());
        assert_eq!(summary.total, 2);
        assert!(!PlanSummary::from_items(&items).is_noop());
    }

    #[test]
    fn summary_serializes_with_named_keys() {
        let summary = PlanSummary::from_items(&build_plan(&[laptop("1", "a", "S")], &[]));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["by_action"]["create"], 1);
        assert_eq!(json["by_endpoint"]["asset_workstations"], 1);
    }
}
