//! Test fixtures and scenario helpers.
//!
//! Provides sample fleets, destination snapshots and executors wired for
//! tests: no limiter waits, in-memory destination.

use crate::recording::RecordingClient;
use fleetsync_engine::{
    DryRunSwitch, EngineConfig, HttpDestinationConfig, HttpStack, MemoryDestination,
    RateLimitConfig, RateLimitedDestination, SyncExecutor,
};
use fleetsync_model::{
    AttrValue, Attributes, DestinationRecord, Endpoint, NetworkAdapter, OsInfo, Processor,
    SourceRecord,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Engine configuration without limiter waits.
pub fn unthrottled_config() -> EngineConfig {
    EngineConfig::new()
        .with_source_limits(RateLimitConfig::unthrottled())
        .with_destination_limits(RateLimitConfig::unthrottled())
}

/// Executor returned by [`memory_executor`].
pub type MemoryExecutor<'a> = SyncExecutor<RateLimitedDestination<&'a MemoryDestination>>;

/// Executor returned by [`http_executor`].
pub type HttpExecutor<'a> = SyncExecutor<HttpStack<&'a RecordingClient>>;

/// Executor over a borrowed in-memory destination, live mode, no waits.
pub fn memory_executor(dest: &MemoryDestination) -> MemoryExecutor<'_> {
    SyncExecutor::with_config(dest, DryRunSwitch::new(false), unthrottled_config())
}

/// Executor speaking HTTP to a recording client at `base_url`, no waits.
pub fn http_executor<'a>(
    base_url: &str,
    client: &'a RecordingClient,
    switch: &DryRunSwitch,
) -> HttpExecutor<'a> {
    SyncExecutor::http(
        HttpDestinationConfig::new(base_url),
        client,
        switch.clone(),
        unthrottled_config(),
    )
}

fn windows(version: &str) -> OsInfo {
    OsInfo {
        product: Some("Windows 11 Pro".into()),
        version: Some("10.0.22631".into()),
        display_version: Some(version.into()),
        build_number: Some("22631".into()),
    }
}

/// A laptop with one adapter, 16 GiB of memory and Windows 11.
pub fn laptop(id: &str, hostname: &str) -> SourceRecord {
    SourceRecord::new(id, hostname)
        .with_kind("Laptop")
        .with_serial(format!("5CG{id:0>7}"))
        .with_model("HP EliteBook 840 G10")
        .with_manufacturer("HP")
        .with_memory_module(8 * 1024 * 1024 * 1024)
        .with_memory_module(8 * 1024 * 1024 * 1024)
        .with_processor(Processor::new("Intel Core i7-1365U").with_cores(10).with_clock_mhz(1800))
        .with_adapter(
            NetworkAdapter::new("10.20.0.15")
                .with_name("Wi-Fi")
                .with_mask("255.255.255.0")
                .with_gateway("10.20.0.1")
                .with_dhcp(true)
                .with_mac("3C:52:82:11:22:33"),
        )
        .with_os(windows("23H2"))
}

/// A desktop reported under a generic kind.
pub fn desktop(id: &str, hostname: &str) -> SourceRecord {
    SourceRecord::new(id, hostname)
        .with_kind("Desktop")
        .with_serial(format!("MXL{id:0>7}"))
        .with_model("OptiPlex 7010")
        .with_manufacturer("Dell Inc.")
        .with_memory_module(16 * 1024 * 1024 * 1024)
        .with_adapter(NetworkAdapter::new("10.30.0.40").with_mac("B0:7B:25:00:00:01"))
        .with_os(windows("22H2"))
}

/// A virtual machine whose serial is a VMware identifier.
pub fn virtual_server(id: &str, hostname: &str) -> SourceRecord {
    SourceRecord::new(id, hostname)
        .with_kind("Server")
        .with_serial("VMware-42 1a 2b 3c 4d 5e 6f 70-81 92 a3 b4 c5 d6 e7 f8")
        .with_model("VMware Virtual Platform")
        .with_manufacturer("VMware, Inc.")
        .with_memory_module(32 * 1024 * 1024 * 1024)
        .with_adapter(NetworkAdapter::new("10.0.5.21"))
}

/// A rack server.
pub fn physical_server(id: &str, hostname: &str) -> SourceRecord {
    SourceRecord::new(id, hostname)
        .with_kind("Server")
        .with_serial(format!("CZJ{id:0>7}"))
        .with_model("ProLiant DL380 Gen10")
        .with_manufacturer("Hewlett Packard Enterprise")
        .with_memory_module(64 * 1024 * 1024 * 1024)
        .with_adapter(NetworkAdapter::new("10.0.1.10"))
}

/// A managed switch.
pub fn switch(id: &str, hostname: &str) -> SourceRecord {
    SourceRecord::new(id, hostname)
        .with_kind("Network Switch")
        .with_serial(format!("FOC{id:0>7}"))
        .with_model("Catalyst 9300")
        .with_manufacturer("Cisco")
        .with_adapter(NetworkAdapter::new("10.0.0.2"))
}

/// A phone.
pub fn phone(id: &str, hostname: &str) -> SourceRecord {
    SourceRecord::new(id, hostname)
        .with_kind("Mobile Phone")
        .with_serial(format!("F2L{id:0>7}"))
        .with_model("iPhone 15")
        .with_manufacturer("Apple")
}

/// One device of every classification.
pub fn sample_fleet() -> Vec<SourceRecord> {
    vec![
        laptop("1", "lt-001"),
        desktop("2", "pc-002"),
        virtual_server("3", "vm-003"),
        physical_server("4", "srv-004"),
        switch("5", "sw-005"),
        phone("6", "ph-006"),
    ]
}

/// Destination copy of a source record as a previous sync would have
/// written it.
pub fn synced_copy(id: &str, record: &SourceRecord) -> DestinationRecord {
    let classification = fleetsync_engine::classify(record);
    let mapped = fleetsync_engine::map_record(record, classification);
    let mut attributes: Attributes = mapped.fields.clone();
    let name = match attributes.remove("name") {
        Some(AttrValue::Text(name)) => name,
        _ => record.hostname.clone(),
    };
    let serial = match attributes.remove("serial_number") {
        Some(AttrValue::Text(serial)) => Some(serial),
        _ => None,
    };
    DestinationRecord {
        id: id.to_string(),
        name,
        serial_number: serial,
        endpoint: Some(mapped.endpoint),
        attributes,
    }
}

/// Snapshot holding a synced copy of `record` with one attribute changed.
pub fn drifted_copy(id: &str, record: &SourceRecord) -> DestinationRecord {
    let mut copy = synced_copy(id, record);
    copy.attributes
        .insert("ip_address".into(), AttrValue::from("192.168.99.99"));
    copy
}

/// A destination record that matches nothing in [`sample_fleet`].
pub fn unrelated_record(id: &str) -> DestinationRecord {
    DestinationRecord::new(id, "printer-7")
        .with_serial("PRN0000007")
        .with_endpoint(Endpoint::Workstations)
}

/// A temporary data directory, removed on drop.
pub struct TestDataDir {
    dir: TempDir,
}

impl TestDataDir {
    /// Creates an empty data directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Root of the directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes `records` as a JSON source file and returns its path.
    pub fn write_source(&self, name: &str, records: &[SourceRecord]) -> PathBuf {
        let path = self.file(name);
        let json = serde_json::to_vec_pretty(records).expect("Failed to encode records");
        std::fs::write(&path, json).expect("Failed to write source file");
        path
    }

    /// Writes `records` as a JSON snapshot file and returns its path.
    pub fn write_snapshot(&self, name: &str, records: &[DestinationRecord]) -> PathBuf {
        let path = self.file(name);
        let json = serde_json::to_vec_pretty(records).expect("Failed to encode snapshot");
        std::fs::write(&path, json).expect("Failed to write snapshot file");
        path
    }
}

impl Default for TestDataDir {
    fn default() -> Self {
        Self::new()
    }
}
