//! Sync plan types.

use crate::classification::{Classification, Endpoint};
use crate::source::SourceRecord;
use crate::value::{AttrValue, Attributes};
use serde::{Deserialize, Serialize};

/// Destination-shaped attribute tree, tagged with its endpoint.
///
/// Recomputed on every run and never persisted independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedAttributes {
    /// Endpoint the attributes are written to.
    pub endpoint: Endpoint,
    /// Top-level destination fields.
    pub fields: Attributes,
}

impl MappedAttributes {
    /// Creates an empty tree for an endpoint.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            fields: Attributes::new(),
        }
    }

    /// Returns the mapped `name` field.
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(AttrValue::as_text)
    }

    /// Returns the mapped `serial_number` field.
    pub fn serial_number(&self) -> Option<&str> {
        self.fields.get("serial_number").and_then(AttrValue::as_text)
    }

    /// Returns a copy restricted to the given top-level fields.
    pub fn subset<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Attributes {
        keys.into_iter()
            .filter_map(|k| self.fields.get_key_value(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// How a source record was bound to a destination record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Case-insensitive name equality.
    Hostname,
    /// Case-insensitive serial number equality.
    Serial,
    /// No destination record matched.
    #[serde(rename = "none")]
    NoMatch,
}

/// Outcome of matching one source record against the destination snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Source record identifier.
    pub source_id: String,
    /// Bound destination record, if any.
    pub destination_id: Option<String>,
    /// Method that produced the binding.
    pub method: MatchMethod,
    /// Collection the bound record lives in, if the snapshot says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
}

impl MatchResult {
    /// A match bound to a destination record.
    pub fn bound(
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
        method: MatchMethod,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            destination_id: Some(destination_id.into()),
            method,
            endpoint: None,
        }
    }

    /// Records the collection of the bound destination record.
    pub fn with_endpoint(mut self, endpoint: Option<Endpoint>) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// A result with no destination record.
    pub fn unmatched(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            destination_id: None,
            method: MatchMethod::NoMatch,
            endpoint: None,
        }
    }

    /// Returns true if a destination record is bound.
    pub fn is_matched(&self) -> bool {
        self.destination_id.is_some()
    }
}

/// Per-field comparison verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    /// Destination holds no value for the field.
    New,
    /// Destination holds a different value.
    Changed,
    /// Destination already holds the mapped value.
    Unchanged,
}

/// Comparison of one mapped field against the destination's current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldVerdict {
    /// Dotted field path (`operating_system.os`).
    pub path: String,
    /// Verdict.
    pub kind: VerdictKind,
    /// Current destination value.
    pub old: Option<AttrValue>,
    /// Mapped source value.
    pub new: AttrValue,
}

impl FieldVerdict {
    /// Returns true if the field must be written.
    pub fn is_dirty(&self) -> bool {
        matches!(self.kind, VerdictKind::New | VerdictKind::Changed)
    }

    /// Top-level destination field the path belongs to.
    pub fn top_level(&self) -> &str {
        self.path.split('.').next().unwrap_or(&self.path)
    }
}

/// Action decided for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// Create a new destination record.
    Create,
    /// Update the matched destination record.
    Update,
    /// Do nothing.
    Skip,
}

/// Unit of work for the executor. Built fresh on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncItem {
    /// Source record.
    pub source: SourceRecord,
    /// Derived category.
    pub classification: Classification,
    /// Mapped attributes.
    pub mapped: MappedAttributes,
    /// Match against the destination snapshot.
    pub matched: MatchResult,
    /// Per-field verdicts. Empty when nothing matched.
    pub verdicts: Vec<FieldVerdict>,
    /// Decided action.
    pub action: SyncAction,
}

impl SyncItem {
    /// Name shown in results: the mapped name, falling back to the hostname.
    pub fn display_name(&self) -> &str {
        self.mapped.name().unwrap_or(&self.source.hostname)
    }

    /// Paths of fields with a `new` or `changed` verdict.
    pub fn changed_fields(&self) -> Vec<String> {
        self.verdicts
            .iter()
            .filter(|v| v.is_dirty())
            .map(|v| v.path.clone())
            .collect()
    }

    /// Attributes an update must send: every top-level field with at least
    /// one dirty verdict.
    pub fn update_payload(&self) -> Attributes {
        let mut keys: Vec<&str> = self
            .verdicts
            .iter()
            .filter(|v| v.is_dirty())
            .map(FieldVerdict::top_level)
            .collect();
        keys.dedup();
        self.mapped.subset(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(path: &str, kind: VerdictKind) -> FieldVerdict {
        FieldVerdict {
            path: path.to_string(),
            kind,
            old: None,
            new: AttrValue::from("x"),
        }
    }

    fn item(verdicts: Vec<FieldVerdict>) -> SyncItem {
        let mut mapped = MappedAttributes::new(Endpoint::Workstations);
        mapped.fields.insert("name".into(), "WS-1".into());
        mapped.fields.insert("ip_address".into(), "10.0.0.1".into());
        let mut os = Attributes::new();
        os.insert("os".into(), "Windows".into());
        os.insert("version".into(), "11".into());
        mapped.fields.insert("operating_system".into(), os.into());

        SyncItem {
            source: SourceRecord::new("s1", "ws-1"),
            classification: Classification::Desktop,
            mapped,
            matched: MatchResult::bound("s1", "d1", MatchMethod::Hostname),
            verdicts,
            action: SyncAction::Update,
        }
    }

    #[test]
    fn update_payload_is_minimal() {
        let item = item(vec![
            verdict("name", VerdictKind::Unchanged),
            verdict("ip_address", VerdictKind::Unchanged),
            verdict("operating_system.os", VerdictKind::Unchanged),
            verdict("operating_system.version", VerdictKind::Changed),
        ]);

        let payload = item.update_payload();
        assert_eq!(payload.len(), 1);
        assert!(payload.contains_key("operating_system"));
        assert_eq!(item.changed_fields(), vec!["operating_system.version"]);
    }

    #[test]
    fn display_name_prefers_mapped_name() {
        let item = item(vec![]);
        assert_eq!(item.display_name(), "WS-1");
    }

    #[test]
    fn match_method_serializes_none() {
        let result = MatchResult::unmatched("s1");
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"method\":\"none\""));
        assert!(!result.is_matched());
    }

    #[test]
    fn match_keeps_the_record_collection() {
        let result = MatchResult::bound("s1", "9", MatchMethod::Hostname)
            .with_endpoint(Some(Endpoint::Servers));
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"endpoint\":\"asset_servers\""));

        let legacy: MatchResult =
            serde_json::from_str(r#"{"source_id":"s1","destination_id":"9","method":"hostname"}"#)
                .unwrap();
        assert_eq!(legacy.endpoint, None);
    }
}
