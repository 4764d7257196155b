//! Device classification.
//!
//! Classification is an ordered list of predicate/category rules evaluated
//! in fixed priority. The first rule whose predicate holds decides the
//! category; records no rule claims are desktops.

use fleetsync_model::{Classification, SourceRecord};
use regex::Regex;
use std::sync::LazyLock;

/// Model substrings that identify portable hardware.
const LAPTOP_KEYWORDS: &[&str] = &[
    "probook",
    "elitebook",
    "latitude",
    "thinkpad",
    "pavilion",
    "macbook",
    "xps",
    "inspiron",
    "zbook",
    "surface laptop",
];

/// Substrings that betray a hypervisor in serial, model or BIOS vendor.
const HYPERVISOR_INDICATORS: &[&str] = &["vmware", "virtual", "hyper-v", "qemu", "xen"];

/// Lenovo machine-type part numbers (`21BT000BUK`) carry no series name.
static LENOVO_PART_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^\d{2}[A-Z0-9]{2}\d{3,4}[A-Z]{2}$").ok());

/// Serial formats assigned by hypervisors rather than hardware vendors.
static HYPERVISOR_SERIAL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:",
        // VMware: "VMware-42 1a 2b 3c 4d 5e 6f 70-81 92 a3 b4 c5 d6 e7 f8"
        r"vmware-[0-9a-f]{2}(?: [0-9a-f]{2}){7}-[0-9a-f]{2}(?: [0-9a-f]{2}){7}",
        // Hyper-V: "0000-0017-5426-2371-6243-0150-71"
        r"|\d{4}-\d{4}-\d{4}-\d{4}-\d{4}-\d{4}-\d{2}",
        r")$"
    ))
    .ok()
});

fn is_match(pattern: &LazyLock<Option<Regex>>, value: &str) -> bool {
    (**pattern).as_ref().is_some_and(|re| re.is_match(value))
}

/// One classification rule.
struct Rule {
    name: &'static str,
    applies: fn(&SourceRecord) -> bool,
    class: Classification,
}

/// Rules in priority order.
const RULES: &[Rule] = &[
    Rule {
        name: "network-kind",
        applies: |r| kind_is(r, &["network", "switch", "router", "firewall"]),
        class: Classification::NetworkDevice,
    },
    Rule {
        name: "mobile-kind",
        applies: |r| kind_is(r, &["mobile", "phone", "tablet"]),
        class: Classification::MobileDevice,
    },
    Rule {
        name: "virtual-server",
        applies: |r| kind_is(r, &["server"]) && is_virtual(r),
        class: Classification::VirtualServer,
    },
    Rule {
        name: "server-kind",
        applies: |r| kind_is(r, &["server"]),
        class: Classification::PhysicalServer,
    },
    Rule {
        name: "laptop-kind",
        applies: |r| kind_is(r, &["laptop", "notebook"]),
        class: Classification::Laptop,
    },
    Rule {
        name: "laptop-model",
        applies: |r| kind_is(r, &["desktop"]) && has_laptop_model(r),
        class: Classification::Laptop,
    },
];

/// Classifies a source record. Total and deterministic.
pub fn classify(record: &SourceRecord) -> Classification {
    classify_with_rule(record).0
}

/// Classifies a source record and names the rule that decided it
/// (`"default"` when none applied).
pub fn classify_with_rule(record: &SourceRecord) -> (Classification, &'static str) {
    RULES
        .iter()
        .find(|rule| (rule.applies)(record))
        .map(|rule| (rule.class, rule.name))
        .unwrap_or((Classification::Desktop, "default"))
}

/// Returns true if the serial number was assigned by a hypervisor.
///
/// Such serials are shared or synthetic and must not be used for identity.
pub fn is_hypervisor_serial(serial: &str) -> bool {
    let serial = serial.trim();
    is_match(&HYPERVISOR_SERIAL, serial) || contains_indicator(serial)
}

fn kind_is(record: &SourceRecord, needles: &[&str]) -> bool {
    let kind = record.kind.to_ascii_lowercase();
    needles.iter().any(|needle| kind.contains(needle))
}

fn contains_indicator(value: &str) -> bool {
    let value = value.to_ascii_lowercase();
    HYPERVISOR_INDICATORS
        .iter()
        .any(|indicator| value.contains(indicator))
}

fn is_virtual(record: &SourceRecord) -> bool {
    record
        .serial_number
        .as_deref()
        .is_some_and(is_hypervisor_serial)
        || record.model.as_deref().is_some_and(contains_indicator)
        || record.bios_vendor.as_deref().is_some_and(contains_indicator)
}

fn has_laptop_model(record: &SourceRecord) -> bool {
    let Some(model) = record.model.as_deref() else {
        return false;
    };
    let lowered = model.to_ascii_lowercase();
    LAPTOP_KEYWORDS.iter().any(|k| lowered.contains(k))
        || is_match(&LENOVO_PART_NUMBER, model.trim())
}
