//! Run ledger types.

use crate::classification::{Classification, Endpoint};
use crate::item::SyncAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serializable error category attached to failed item outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials were rejected.
    Authentication,
    /// The remote API asked the caller to slow down.
    Throttled,
    /// The destination rejected the payload.
    Validation,
    /// Transient I/O failure.
    Network,
    /// The addressed record does not exist.
    NotFound,
    /// A mutating call was refused because dry-run is active.
    DryRunBlocked,
    /// The remote answered with something that could not be decoded.
    Protocol,
    /// The run was cancelled.
    Cancelled,
}

/// Final status of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// A destination record was created.
    Created,
    /// The matched destination record was updated.
    Updated,
    /// Nothing was written.
    Skipped,
    /// The call failed.
    Failed,
}

/// Outcome of one item, as recorded in the run ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Source record identifier.
    pub source_id: String,
    /// Display name.
    pub name: String,
    /// Derived category.
    pub classification: Classification,
    /// Endpoint the item maps to.
    pub endpoint: Endpoint,
    /// Action decided for the item (after selection and create-only).
    pub action: SyncAction,
    /// Final status.
    pub status: OutcomeStatus,
    /// Destination identifier created or updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<String>,
    /// Paths of fields written (or that would have been written).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_fields: Vec<String>,
    /// Human-readable note or error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error category when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ItemOutcome {
    /// Returns true if the item failed.
    pub fn is_failure(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

/// Ledger of one execution.
///
/// Built once from the item outcomes and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Run identifier.
    pub run_id: String,
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// Whether writes were intercepted.
    pub dry_run: bool,
    /// Number of items processed.
    pub total_items: usize,
    /// Items created.
    pub created: usize,
    /// Items updated.
    pub updated: usize,
    /// Items skipped.
    pub skipped: usize,
    /// Items failed.
    pub errors: usize,
    /// True when the run stopped early on a cancellation signal.
    #[serde(default)]
    pub cancelled: bool,
    /// Per-item outcomes in source order.
    pub items: Vec<ItemOutcome>,
}

impl SyncResult {
    /// Builds the ledger, deriving all counters from the outcomes.
    pub fn from_outcomes(
        run_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        dry_run: bool,
        cancelled: bool,
        items: Vec<ItemOutcome>,
    ) -> Self {
        let count = |status| items.iter().filter(|o| o.status == status).count();
        Self {
            run_id: run_id.into(),
            timestamp,
            dry_run,
            total_items: items.len(),
            created: count(OutcomeStatus::Created),
            updated: count(OutcomeStatus::Updated),
            skipped: count(OutcomeStatus::Skipped),
            errors: count(OutcomeStatus::Failed),
            cancelled,
            items,
        }
    }

    /// Returns true if no item failed.
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }

    /// Identifiers created by this run, in creation order.
    pub fn created_ids(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(|o| o.status == OutcomeStatus::Created)
            .filter_map(|o| o.destination_id.as_deref())
    }
}
