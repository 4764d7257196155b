//! Property-based test generators using proptest.
//!
//! Strategies produce source records shaped like registry exports, with
//! enough hypervisor serials and model names mixed in to exercise every
//! classification rule.

use fleetsync_model::{AttrValue, NetworkAdapter, OsInfo, Processor, SourceRecord};
use proptest::prelude::*;
use std::time::Duration;

/// Strategy for hostnames such as `lt-0042` or `SRV-DB-7`.
pub fn hostname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z]{2,4}(-[a-zA-Z0-9]{1,6}){1,2}").expect("Invalid regex")
}

/// Strategy for device kinds as reported by the registry.
pub fn kind_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "Laptop",
        "Notebook",
        "Desktop",
        "Workstation",
        "Server",
        "Virtual Server",
        "Network Switch",
        "Router",
        "Firewall",
        "Mobile Phone",
        "Tablet",
        "",
        "Unknown",
    ])
    .prop_map(str::to_string)
}

/// Strategy for serial numbers, hardware and hypervisor formats mixed.
pub fn serial_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => prop::string::string_regex("[A-Z0-9]{8,12}").expect("Invalid regex"),
        1 => prop::collection::vec(any::<u8>(), 16).prop_map(|b| {
            let hex: Vec<String> = b.iter().map(|x| format!("{x:02x}")).collect();
            format!("VMware-{}-{}", hex[..8].join(" "), hex[8..].join(" "))
        }),
        1 => prop::string::string_regex(r"\d{4}-\d{4}-\d{4}-\d{4}-\d{4}-\d{4}-\d{2}")
            .expect("Invalid regex"),
        1 => Just("Virtual".to_string()),
    ]
}

/// Strategy for model names, laptop series included.
pub fn model_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "EliteBook 840 G10",
        "ThinkPad T14",
        "Latitude 7440",
        "OptiPlex 7010",
        "ProLiant DL380",
        "VMware Virtual Platform",
        "Virtual Machine",
        "21BT000BUK",
        "Catalyst 9300",
        "iPhone 15",
    ])
    .prop_map(str::to_string)
}

/// Strategy for IPv4 addresses, including the unusable ones.
pub fn address_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => (1u8..224, any::<u8>(), any::<u8>(), 1u8..255)
            .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}")),
        1 => Just("0.0.0.0".to_string()),
        1 => Just("127.0.0.1".to_string()),
        1 => (any::<u8>(), 1u8..255).prop_map(|(c, d)| format!("169.254.{c}.{d}")),
    ]
}

fn adapter_strategy() -> impl Strategy<Value = NetworkAdapter> {
    (address_strategy(), any::<bool>(), prop::option::of(any::<[u8; 6]>())).prop_map(
        |(address, dhcp, mac)| {
            let adapter = NetworkAdapter::new(address).with_dhcp(dhcp);
            match mac {
                Some(m) => adapter.with_mac(format!(
                    "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
                    m[0], m[1], m[2], m[3], m[4], m[5]
                )),
                None => adapter,
            }
        },
    )
}

fn processor_strategy() -> impl Strategy<Value = Processor> {
    (
        prop::sample::select(vec!["Intel Core i7-1365U", "AMD EPYC 7443", "Apple M2"]),
        prop::option::of(1u32..128),
        prop::option::of(800u32..5000),
    )
        .prop_map(|(name, cores, mhz)| {
            let mut processor = Processor::new(name);
            processor.cores = cores;
            processor.clock_mhz = mhz;
            processor
        })
}

fn os_strategy() -> impl Strategy<Value = OsInfo> {
    (
        prop::sample::select(vec!["Windows 11 Pro", "Windows Server 2022", "Ubuntu 22.04"]),
        prop::option::of(prop::sample::select(vec!["22H2", "23H2", "24H2"])),
    )
        .prop_map(|(product, display)| OsInfo {
            product: Some(product.to_string()),
            version: None,
            display_version: display.map(str::to_string),
            build_number: None,
        })
}

/// Strategy for complete source records.
pub fn source_record_strategy() -> impl Strategy<Value = SourceRecord> {
    (
        "[0-9]{1,6}",
        hostname_strategy(),
        kind_strategy(),
        prop::option::of(serial_strategy()),
        prop::option::of(model_strategy()),
        prop::option::of(prop::sample::select(vec![
            "LENOVO",
            "Dell Inc.",
            "HP",
            "VMware, Inc.",
            "Apple",
        ])),
        prop::collection::vec(1u64..=64, 0..4),
        prop::collection::vec(adapter_strategy(), 0..3),
        prop::collection::vec(processor_strategy(), 0..2),
        prop::option::of(os_strategy()),
    )
        .prop_map(
            |(id, hostname, kind, serial, model, vendor, modules, adapters, cpus, os)| {
                let mut record = SourceRecord::new(id, hostname).with_kind(kind);
                record.serial_number = serial;
                record.model = model;
                record.manufacturer = vendor.map(str::to_string);
                for gib in modules {
                    record = record.with_memory_module(gib * 1024 * 1024 * 1024);
                }
                record.network_adapters = adapters;
                record.processors = cpus;
                record.os = os;
                record
            },
        )
}

/// Strategy for fleets with unique source ids and hostnames.
pub fn fleet_strategy(max: usize) -> impl Strategy<Value = Vec<SourceRecord>> {
    prop::collection::vec(source_record_strategy(), 0..=max).prop_map(|records| {
        records
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                record.id = format!("src-{i}");
                record.hostname = format!("{}-{i}", record.hostname);
                record
            })
            .collect()
    })
}

/// Strategy for scalar attribute values.
pub fn scalar_value_strategy() -> impl Strategy<Value = AttrValue> {
    prop_oneof![
        Just(AttrValue::Null),
        any::<bool>().prop_map(AttrValue::Bool),
        any::<i64>().prop_map(AttrValue::Integer),
        "[ a-zA-Z0-9.-]{0,16}".prop_map(AttrValue::Text),
    ]
}

/// One event fed to a rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterEvent {
    /// A successful call.
    Success,
    /// A throttling response with an optional server-provided wait.
    Throttled(Option<Duration>),
}

/// Strategy for sequences of limiter events.
pub fn limiter_events_strategy(max: usize) -> impl Strategy<Value = Vec<LimiterEvent>> {
    prop::collection::vec(
        prop_oneof![
            3 => Just(LimiterEvent::Success),
            1 => Just(LimiterEvent::Throttled(None)),
            1 => (0u64..600).prop_map(|s| LimiterEvent::Throttled(Some(Duration::from_secs(s)))),
        ],
        0..=max,
    )
}

/// Strategy for `(min, max)` interval bounds in milliseconds, `min <= max`.
pub fn interval_bounds_strategy() -> impl Strategy<Value = (Duration, Duration)> {
    (0u64..2_000, 0u64..200_000).prop_map(|(min, extra)| {
        (
            Duration::from_millis(min),
            Duration::from_millis(min + extra),
        )
    })
}
