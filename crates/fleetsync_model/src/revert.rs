//! Revert log types.

use crate::classification::Endpoint;
use serde::{Deserialize, Serialize};

/// One destination record created by a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevertEntry {
    /// Destination-assigned identifier.
    pub destination_id: String,
    /// Endpoint the record was created at.
    pub endpoint: Endpoint,
    /// Run that created the record.
    pub run_id: String,
    /// Display name at creation time.
    #[serde(default)]
    pub name: String,
}

impl RevertEntry {
    /// Creates an entry.
    pub fn new(
        destination_id: impl Into<String>,
        endpoint: Endpoint,
        run_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            destination_id: destination_id.into(),
            endpoint,
            run_id: run_id.into(),
            name: name.into(),
        }
    }
}

/// Ordered, append-only list of created records.
///
/// Entries leave the log only through [`RevertLog::remove`], which revert
/// calls for entries whose delete succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevertLog {
    entries: Vec<RevertEntry>,
}

impl RevertLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn append(&mut self, entry: RevertEntry) {
        self.entries.push(entry);
    }

    /// All entries in append order.
    pub fn entries(&self) -> &[RevertEntry] {
        &self.entries
    }

    /// Entries belonging to one run, in append order.
    pub fn entries_for(&self, run_id: &str) -> Vec<RevertEntry> {
        self.entries
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Distinct run identifiers, oldest first.
    pub fn run_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !ids.contains(&entry.run_id) {
                ids.push(entry.run_id.clone());
            }
        }
        ids
    }

    /// Most recent run still present in the log.
    pub fn latest_run(&self) -> Option<&str> {
        self.entries.last().map(|e| e.run_id.as_str())
    }

    /// Removes the given entries of a run. Returns how many were removed.
    pub fn remove(&mut self, run_id: &str, destination_ids: &[String]) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.run_id == run_id && destination_ids.contains(&e.destination_id)));
        before - self.entries.len()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the log holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> RevertLog {
        let mut log = RevertLog::new();
        log.append(RevertEntry::new("1", Endpoint::Workstations, "run-a", "ws-1"));
        log.append(RevertEntry::new("2", Endpoint::Servers, "run-b", "srv-1"));
        log.append(RevertEntry::new("3", Endpoint::Workstations, "run-a", "ws-2"));
        log
    }

    #[test]
    fn entries_by_run() {
        let log = log();
        let ids: Vec<_> = log
            .entries_for("run-a")
            .into_iter()
            .map(|e| e.destination_id)
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(log.run_ids(), vec!["run-a", "run-b"]);
        assert_eq!(log.latest_run(), Some("run-a"));
    }

    #[test]
    fn remove_only_touches_named_run() {
        let mut log = log();
        let removed = log.remove("run-a", &["1".to_string(), "2".to_string()]);
        assert_eq!(removed, 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries_for("run-b").len(), 1);
    }

    #[test]
    fn serializes_as_list() {
        let json = serde_json::to_string(&log()).unwrap();
        assert!(json.starts_with('['));
        let back: RevertLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log());
    }
}
