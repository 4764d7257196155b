//! Matching source records against the destination snapshot.

use fleetsync_model::{
    Classification, DestinationRecord, MappedAttributes, MatchMethod, MatchResult,
};
use std::collections::HashMap;

/// Binds source records to destination records, first match wins.
///
/// A destination record is claimed by at most one source record per run;
/// once claimed it leaves the pool for every later source record.
pub struct Matcher<'a> {
    snapshot: &'a [DestinationRecord],
    claimed: Vec<bool>,
    by_name: HashMap<String, Vec<usize>>,
    by_serial: HashMap<String, Vec<usize>>,
}

impl<'a> Matcher<'a> {
    /// Indexes a destination snapshot.
    pub fn new(snapshot: &'a [DestinationRecord]) -> Self {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_serial: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, record) in snapshot.iter().enumerate() {
            if let Some(key) = normalize(&record.name) {
                by_name.entry(key).or_default().push(idx);
            }
            if let Some(key) = record.serial_number.as_deref().and_then(normalize) {
                by_serial.entry(key).or_default().push(idx);
            }
        }

        Self {
            snapshot,
            claimed: vec![false; snapshot.len()],
            by_name,
            by_serial,
        }
    }

    /// Matches one mapped source record.
    ///
    /// Hostname is tried first, then serial number. Virtual servers are
    /// never matched by serial.
    pub fn match_record(
        &mut self,
        source_id: &str,
        mapped: &MappedAttributes,
        classification: Classification,
    ) -> (MatchResult, Option<&'a DestinationRecord>) {
        if let Some(idx) = mapped
            .name()
            .and_then(normalize)
            .and_then(|key| self.claim(Index::Name, &key))
        {
            return self.bound(source_id, idx, MatchMethod::Hostname);
        }

        if classification != Classification::VirtualServer {
            if let Some(idx) = mapped
                .serial_number()
                .and_then(normalize)
                .and_then(|key| self.claim(Index::Serial, &key))
            {
                return self.bound(source_id, idx, MatchMethod::Serial);
            }
        }

        (MatchResult::unmatched(source_id), None)
    }

    /// Number of destination records not yet claimed.
    pub fn unclaimed(&self) -> usize {
        self.claimed.iter().filter(|c| !**c).count()
    }

    fn claim(&mut self, index: Index, key: &str) -> Option<usize> {
        let candidates = match index {
            Index::Name => self.by_name.get(key),
            Index::Serial => self.by_serial.get(key),
        }?;
        let idx = candidates.iter().copied().find(|&i| !self.claimed[i])?;
        self.claimed[idx] = true;
        Some(idx)
    }

    fn bound(
        &self,
        source_id: &str,
        idx: usize,
        method: MatchMethod,
    ) -> (MatchResult, Option<&'a DestinationRecord>) {
        let record = &self.snapshot[idx];
        let result =
            MatchResult::bound(source_id, &record.id, method).with_endpoint(record.endpoint);
        (result, Some(record))
    }
}

#[derive(Clone, Copy)]
enum Index {
    Name,
    Serial,
}

fn normalize(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_uppercase())
}
