//! Adapter traits for the source registry and the destination CMDB.

use crate::error::{EngineResult, SyncError};
use crate::http::GENERIC_COLLECTION;
use fleetsync_model::{AttrValue, Attributes, DestinationRecord, Endpoint, SourceRecord};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Reads device records from the source registry.
pub trait SourceAdapter: Send + Sync {
    /// Fetches every device record.
    fn fetch(&self) -> EngineResult<Vec<SourceRecord>>;
}

/// Performs calls against the destination CMDB.
///
/// This trait abstracts the network layer so the executor can run against
/// HTTP, a snapshot file or an in-memory fake.
pub trait DestinationAdapter: Send + Sync {
    /// Creates a record and returns its destination identifier.
    fn create(&self, endpoint: Endpoint, attrs: &Attributes) -> EngineResult<String>;

    /// Updates a record with the given top-level fields.
    ///
    /// `endpoint` is the collection the record lives in, when known.
    /// Without it the update goes through the generic asset route.
    fn update(
        &self,
        endpoint: Option<Endpoint>,
        id: &str,
        attrs: &Attributes,
    ) -> EngineResult<()>;

    /// Deletes a record.
    fn delete(&self, endpoint: Endpoint, id: &str) -> EngineResult<()>;

    /// Reads the full destination snapshot.
    fn list(&self) -> EngineResult<Vec<DestinationRecord>>;
}

impl<T: SourceAdapter + ?Sized> SourceAdapter for &T {
    fn fetch(&self) -> EngineResult<Vec<SourceRecord>> {
        (**self).fetch()
    }
}

impl<T: SourceAdapter + ?Sized> SourceAdapter for Arc<T> {
    fn fetch(&self) -> EngineResult<Vec<SourceRecord>> {
        (**self).fetch()
    }
}

impl<T: DestinationAdapter + ?Sized> DestinationAdapter for &T {
    fn create(&self, endpoint: Endpoint, attrs: &Attributes) -> EngineResult<String> {
        (**self).create(endpoint, attrs)
    }

    fn update(
        &self,
        endpoint: Option<Endpoint>,
        id: &str,
        attrs: &Attributes,
    ) -> EngineResult<()> {
        (**self).update(endpoint, id, attrs)
    }

    fn delete(&self, endpoint: Endpoint, id: &str) -> EngineResult<()> {
        (**self).delete(endpoint, id)
    }

    fn list(&self) -> EngineResult<Vec<DestinationRecord>> {
        (**self).list()
    }
}

impl<T: DestinationAdapter + ?Sized> DestinationAdapter for Arc<T> {
    fn create(&self, endpoint: Endpoint, attrs: &Attributes) -> EngineResult<String> {
        (**self).create(endpoint, attrs)
    }

    fn update(
        &self,
        endpoint: Option<Endpoint>,
        id: &str,
        attrs: &Attributes,
    ) -> EngineResult<()> {
        (**self).update(endpoint, id, attrs)
    }

    fn delete(&self, endpoint: Endpoint, id: &str) -> EngineResult<()> {
        (**self).delete(endpoint, id)
    }

    fn list(&self) -> EngineResult<Vec<DestinationRecord>> {
        (**self).list()
    }
}

/// A call observed by [`MemoryDestination`].
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationCall {
    /// A create that reached the adapter.
    Create {
        /// Endpoint.
        endpoint: Endpoint,
        /// Attributes sent.
        attrs: Attributes,
    },
    /// An update that reached the adapter.
    Update {
        /// Collection addressed, if known.
        endpoint: Option<Endpoint>,
        /// Record addressed.
        id: String,
        /// Attributes sent.
        attrs: Attributes,
    },
    /// A delete that reached the adapter.
    Delete {
        /// Endpoint.
        endpoint: Endpoint,
        /// Record addressed.
        id: String,
    },
    /// A snapshot read.
    List,
}

impl DestinationCall {
    /// Returns true for create, update and delete.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, DestinationCall::List)
    }
}

/// An in-memory destination for tests.
///
/// Records every call, applies writes to an in-memory record set, and can
/// be scripted to fail or throttle.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    records: Mutex<Vec<DestinationRecord>>,
    calls: Mutex<Vec<DestinationCall>>,
    failures: Mutex<HashMap<String, SyncError>>,
    scripted: Mutex<VecDeque<SyncError>>,
    next_id: AtomicU64,
}

impl MemoryDestination {
    /// Creates an empty destination.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            ..Self::default()
        }
    }

    /// Creates a destination holding the given records.
    pub fn with_records(records: Vec<DestinationRecord>) -> Self {
        let dest = Self::new();
        *dest.records.lock() = records;
        dest
    }

    /// Current records.
    pub fn records(&self) -> Vec<DestinationRecord> {
        self.records.lock().clone()
    }

    /// Looks up a record by id.
    pub fn get(&self, id: &str) -> Option<DestinationRecord> {
        self.records.lock().iter().find(|r| r.id == id).cloned()
    }

    /// Every call received, in order.
    pub fn calls(&self) -> Vec<DestinationCall> {
        self.calls.lock().clone()
    }

    /// Number of create/update/delete calls received.
    pub fn mutating_calls(&self) -> usize {
        self.calls.lock().iter().filter(|c| c.is_mutating()).count()
    }

    /// Makes every write addressing `key` fail with `error`. The key is a
    /// record name for creates and updates, an id for updates and deletes.
    pub fn fail_on(&self, key: impl Into<String>, error: SyncError) {
        self.failures.lock().insert(key.into(), error);
    }

    /// Queues errors returned by the next calls, one per call, before
    /// normal handling resumes.
    pub fn push_error(&self, error: SyncError) {
        self.scripted.lock().push_back(error);
    }

    /// Queues `n` throttling responses.
    pub fn throttle_next(&self, n: usize) {
        for _ in 0..n {
            self.push_error(SyncError::throttled(None));
        }
    }

    fn scripted_error(&self, keys: &[&str]) -> Option<SyncError> {
        if let Some(err) = self.scripted.lock().pop_front() {
            return Some(err);
        }
        let failures = self.failures.lock();
        keys.iter().find_map(|k| failures.get(*k).cloned())
    }

    fn record_from(id: String, endpoint: Option<Endpoint>, attrs: &Attributes) -> DestinationRecord {
        let mut attributes = attrs.clone();
        let name = match attributes.remove("name") {
            Some(AttrValue::Text(name)) => name,
            _ => String::new(),
        };
        let serial_number = match attributes.remove("serial_number") {
            Some(AttrValue::Text(serial)) => Some(serial),
            _ => None,
        };
        DestinationRecord {
            id,
            name,
            serial_number,
            endpoint,
            attributes,
        }
    }
}

fn text_field<'a>(attrs: &'a Attributes, key: &str) -> &'a str {
    attrs.get(key).and_then(AttrValue::as_text).unwrap_or("")
}

impl DestinationAdapter for MemoryDestination {
    fn create(&self, endpoint: Endpoint, attrs: &Attributes) -> EngineResult<String> {
        self.calls.lock().push(DestinationCall::Create {
            endpoint,
            attrs: attrs.clone(),
        });
        if let Some(err) = self.scripted_error(&[text_field(attrs, "name")]) {
            return Err(err);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.records
            .lock()
            .push(Self::record_from(id.clone(), Some(endpoint), attrs));
        Ok(id)
    }

    fn update(
        &self,
        endpoint: Option<Endpoint>,
        id: &str,
        attrs: &Attributes,
    ) -> EngineResult<()> {
        self.calls.lock().push(DestinationCall::Update {
            endpoint,
            id: id.to_string(),
            attrs: attrs.clone(),
        });
        if let Some(err) = self.scripted_error(&[id, text_field(attrs, "name")]) {
            return Err(err);
        }

        // A typed route only reaches records of that collection.
        let collection = endpoint.map_or(GENERIC_COLLECTION, Endpoint::api_name);
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id == id && (endpoint.is_none() || r.endpoint == endpoint))
            .ok_or_else(|| SyncError::not_found(collection, id))?;
        let patch = Self::record_from(record.id.clone(), None, attrs);
        if !patch.name.is_empty() {
            record.name = patch.name;
        }
        if patch.serial_number.is_some() {
            record.serial_number = patch.serial_number;
        }
        record.attributes.extend(patch.attributes);
        Ok(())
    }

    fn delete(&self, endpoint: Endpoint, id: &str) -> EngineResult<()> {
        self.calls.lock().push(DestinationCall::Delete {
            endpoint,
            id: id.to_string(),
        });
        if let Some(err) = self.scripted_error(&[id]) {
            return Err(err);
        }

        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(SyncError::not_found(endpoint, id));
        }
        Ok(())
    }

    fn list(&self) -> EngineResult<Vec<DestinationRecord>> {
        self.calls.lock().push(DestinationCall::List);
        Ok(self.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(name: &str) -> Attributes {
        let mut a = Attributes::new();
        a.insert("name".into(), name.into());
        a.insert("serial_number".into(), "SN-1".into());
        a.insert("ip_address".into(), "10.0.0.1".into());
        a
    }

    #[test]
    fn create_update_delete() {
        let dest = MemoryDestination::new();
        let id = dest.create(Endpoint::Workstations, &attrs("ws-1")).unwrap();

        let record = dest.get(&id).unwrap();
        assert_eq!(record.name, "ws-1");
        assert_eq!(record.serial_number.as_deref(), Some("SN-1"));
        assert_eq!(record.endpoint, Some(Endpoint::Workstations));

        let mut patch = Attributes::new();
        patch.insert("ip_address".into(), "10.0.0.2".into());
        dest.update(Some(Endpoint::Workstations), &id, &patch).unwrap();
        assert_eq!(
            dest.get(&id).unwrap().value_at("ip_address"),
            Some(AttrValue::from("10.0.0.2"))
        );
        dest.update(None, &id, &patch).unwrap();
        assert_eq!(dest.get(&id).unwrap().endpoint, Some(Endpoint::Workstations));

        dest.delete(Endpoint::Workstations, &id).unwrap();
        assert!(dest.get(&id).is_none());
        assert_eq!(dest.mutating_calls(), 4);
    }

    #[test]
    fn update_through_the_wrong_collection_is_not_found() {
        let dest = MemoryDestination::with_records(vec![
            DestinationRecord::new("9", "srv-01").with_endpoint(Endpoint::Servers),
        ]);
        let err = dest
            .update(Some(Endpoint::VirtualMachines), "9", &attrs("srv-01"))
            .unwrap_err();
        assert_eq!(err, SyncError::not_found(Endpoint::VirtualMachines, "9"));
        dest.update(Some(Endpoint::Servers), "9", &attrs("srv-01")).unwrap();
    }

    #[test]
    fn delete_missing_is_not_found() {
        let dest = MemoryDestination::new();
        let err = dest.delete(Endpoint::Servers, "nope").unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }

    #[test]
    fn scripted_errors_come_first() {
        let dest = MemoryDestination::new();
        dest.throttle_next(1);
        assert!(dest
            .create(Endpoint::Workstations, &attrs("a"))
            .unwrap_err()
            .is_throttled());
        assert!(dest.create(Endpoint::Workstations, &attrs("a")).is_ok());
    }

    #[test]
    fn failures_by_name() {
        let dest = MemoryDestination::new();
        dest.fail_on("bad", SyncError::validation("rejected"));
        assert!(dest.create(Endpoint::Workstations, &attrs("bad")).is_err());
        assert!(dest.create(Endpoint::Workstations, &attrs("good")).is_ok());
        assert_eq!(dest.records().len(), 1);
    }

    #[test]
    fn works_through_references() {
        let dest = Arc::new(MemoryDestination::new());
        let by_ref: &dyn DestinationAdapter = &dest;
        by_ref.list().unwrap();
        assert_eq!(dest.calls(), vec![DestinationCall::List]);
    }
}
