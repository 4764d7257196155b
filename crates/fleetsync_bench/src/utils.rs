//! Benchmark utilities.

use fleetsync_model::{DestinationRecord, NetworkAdapter, SourceRecord};
use fleetsync_testkit::fixtures::{drifted_copy, synced_copy};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const KINDS: &[&str] = &[
    "Laptop",
    "Desktop",
    "Workstation",
    "Server",
    "Network Switch",
    "Mobile Phone",
    "",
];

const MODELS: &[&str] = &[
    "HP EliteBook 840 G10",
    "OptiPlex 7010",
    "ThinkPad T14 Gen 4",
    "VMware Virtual Platform",
    "ProLiant DL380 Gen10",
    "Catalyst 9300",
    "iPhone 15",
];

fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

fn random_record(rng: &mut StdRng, i: usize) -> SourceRecord {
    let kind = KINDS.choose(rng).copied().unwrap_or_default();
    let model = MODELS.choose(rng).copied().unwrap_or_default();
    let serial = if model.starts_with("VMware") {
        format!("VMware-42 {:02x} {:02x}", rng.gen::<u8>(), rng.gen::<u8>())
    } else {
        format!("SN{:08}", rng.gen_range(0..100_000_000u32))
    };
    SourceRecord::new(format!("src-{i}"), format!("host-{i:05}"))
        .with_kind(kind)
        .with_model(model)
        .with_serial(serial)
        .with_memory_module(rng.gen_range(4u64..=64) * 1024 * 1024 * 1024)
        .with_adapter(NetworkAdapter::new(format!(
            "10.{}.{}.{}",
            rng.gen_range(0..=255u8),
            rng.gen_range(0..=255u8),
            rng.gen_range(1..=254u8)
        )))
}

/// Generate a fleet of `count` devices with unique hostnames.
pub fn random_fleet(count: usize, seed: u64) -> Vec<SourceRecord> {
    let mut rng = rng(seed);
    (0..count).map(|i| random_record(&mut rng, i)).collect()
}

/// Generate a destination snapshot for `fleet`.
///
/// Roughly `synced` of the devices have an identical copy, `drifted` have
/// a copy with one changed field, and the rest are missing.
pub fn snapshot_for(fleet: &[SourceRecord], synced: f64, drifted: f64, seed: u64) -> Vec<DestinationRecord> {
    let mut rng = rng(seed);
    let mut snapshot = Vec::new();
    for (i, record) in fleet.iter().enumerate() {
        let roll: f64 = rng.gen();
        let id = format!("d{i}");
        if roll < synced {
            snapshot.push(synced_copy(&id, record));
        } else if roll < synced + drifted {
            snapshot.push(drifted_copy(&id, record));
        }
    }
    snapshot
}
