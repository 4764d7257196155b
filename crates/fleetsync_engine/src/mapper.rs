//! Field mapping from source records to destination-shaped attributes.

use crate::classifier::is_hypervisor_serial;
use fleetsync_model::{
    AttrValue, Attributes, Classification, Endpoint, MappedAttributes, NetworkAdapter, Processor,
    SourceRecord,
};
use std::net::Ipv4Addr;

/// Manufacturer spellings rewritten to one canonical name.
const VENDOR_ALIASES: &[(&str, &str)] = &[
    ("LENOVO", "Lenovo"),
    ("Hewlett-Packard", "HP"),
    ("Hewlett Packard", "HP"),
    ("Dell Inc.", "Dell"),
];

/// Manufacturers that are hypervisors, not hardware vendors.
const HYPERVISOR_VENDORS: &[&str] = &["vmware", "qemu", "xen", "innotek"];

/// Destination endpoint for each classification.
pub fn endpoint_for(classification: Classification) -> Endpoint {
    match classification {
        Classification::Laptop | Classification::Desktop => Endpoint::Workstations,
        Classification::VirtualServer => Endpoint::VirtualMachines,
        Classification::PhysicalServer => Endpoint::Servers,
        Classification::NetworkDevice => Endpoint::Switches,
        Classification::MobileDevice => Endpoint::MobileDevices,
    }
}

/// Maps a source record onto the destination schema.
///
/// Empty source values produce no field. Adapter and processor arrays keep
/// source length and order.
pub fn map_record(record: &SourceRecord, classification: Classification) -> MappedAttributes {
    let mut mapped = MappedAttributes::new(endpoint_for(classification));
    let fields = &mut mapped.fields;

    put_text(fields, "name", Some(record.hostname.as_str()));
    put_text(fields, "serial_number", clean_serial(record.serial_number.as_deref()));
    put_text(fields, "ip_address", primary_address(&record.network_adapters));
    put_text(
        fields,
        "mac_address",
        record
            .network_adapters
            .iter()
            .filter_map(|a| a.mac.as_deref())
            .find(|mac| !mac.trim().is_empty()),
    );

    if let Some(os) = &record.os {
        let mut nested = Attributes::new();
        put_text(&mut nested, "os", os.product.as_deref());
        put_text(&mut nested, "version", os.version.as_deref());
        put_text(&mut nested, "service_pack", os.display_version.as_deref());
        put_text(&mut nested, "build_number", os.build_number.as_deref());
        put_map(fields, "operating_system", nested);
    }

    let mut system = Attributes::new();
    put_text(
        &mut system,
        "system_manufacturer",
        normalize_vendor(record.manufacturer.as_deref()),
    );
    put_text(&mut system, "model", record.model.as_deref());
    put_map(fields, "computer_system", system);

    if let Some(total) = record.total_memory_bytes() {
        let mut memory = Attributes::new();
        // Totals beyond i64 are not representable by the destination.
        if let Ok(bytes) = i64::try_from(total) {
            memory.insert("physical_memory".into(), AttrValue::Integer(bytes));
        }
        put_map(fields, "memory", memory);
    }

    if !record.network_adapters.is_empty() {
        let adapters = record.network_adapters.iter().map(map_adapter).collect();
        fields.insert("network_adapters".into(), AttrValue::Array(adapters));
    }

    if !record.processors.is_empty() {
        let processors = record.processors.iter().map(map_processor).collect();
        fields.insert("processors".into(), AttrValue::Array(processors));
    }

    mapped
}

fn map_adapter(adapter: &NetworkAdapter) -> AttrValue {
    let mut out = Attributes::new();
    put_text(
        &mut out,
        "name",
        Some(adapter.name.as_deref().unwrap_or("NIC")),
    );
    put_text(&mut out, "ip_address", usable_address(adapter));
    put_text(&mut out, "mac_address", adapter.mac.as_deref());
    put_text(&mut out, "description", adapter.description.as_deref());
    put_text(
        &mut out,
        "gateway",
        adapter.gateway.as_deref().filter(|g| !is_unspecified(g)),
    );
    put_text(
        &mut out,
        "ipnet_mask",
        adapter.mask.as_deref().filter(|m| !is_unspecified(m)),
    );
    out.insert("dhcp".into(), AttrValue::Bool(adapter.dhcp));
    AttrValue::Map(out)
}

fn map_processor(processor: &Processor) -> AttrValue {
    let mut out = Attributes::new();
    put_text(&mut out, "name", Some(processor.name.as_str()));
    if let Some(cores) = processor.cores {
        out.insert("number_of_cores".into(), AttrValue::Integer(i64::from(cores)));
    }
    if let Some(mhz) = processor.clock_mhz {
        out.insert("speed".into(), AttrValue::Integer(i64::from(mhz)));
    }
    put_text(&mut out, "manufacturer", processor.manufacturer.as_deref());
    AttrValue::Map(out)
}

/// First adapter address that is routable inside the fleet.
fn primary_address(adapters: &[NetworkAdapter]) -> Option<&str> {
    adapters.iter().find_map(usable_address)
}

fn usable_address(adapter: &NetworkAdapter) -> Option<&str> {
    let raw = adapter.address.as_deref()?.trim();
    match raw.parse::<Ipv4Addr>() {
        Ok(ip) if ip.is_unspecified() || ip.is_loopback() || ip.is_link_local() => None,
        Ok(_) => Some(raw),
        // Non-IPv4 strings are passed through unless blank.
        Err(_) => (!raw.is_empty()).then_some(raw),
    }
}

fn is_unspecified(value: &str) -> bool {
    value.trim() == "0.0.0.0"
}

fn clean_serial(serial: Option<&str>) -> Option<&str> {
    serial
        .map(str::trim)
        .filter(|s| !s.is_empty() && !is_hypervisor_serial(s))
}

fn normalize_vendor(vendor: Option<&str>) -> Option<&str> {
    let vendor = vendor?.trim();
    let lowered = vendor.to_ascii_lowercase();
    if HYPERVISOR_VENDORS.iter().any(|h| lowered.contains(h)) {
        return None;
    }
    let canonical = VENDOR_ALIASES
        .iter()
        .find(|(alias, _)| *alias == vendor)
        .map(|(_, canonical)| *canonical);
    Some(canonical.unwrap_or(vendor))
}

fn put_text(fields: &mut Attributes, key: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        fields.insert(key.to_string(), AttrValue::Text(value.to_string()));
    }
}

fn put_map(fields: &mut Attributes, key: &str, nested: Attributes) {
    if !nested.is_empty() {
        fields.insert(key.to_string(), AttrValue::Map(nested));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsync_model::{lookup_path, OsInfo};

    fn laptop() -> SourceRecord {
        SourceRecord::new("s-1", "LT-0042")
            .with_kind("Desktop")
            .with_serial(" PF3ABC12 ")
            .with_model("ThinkPad T14")
            .with_manufacturer("LENOVO")
            .with_memory_module(8_589_934_592)
            .with_memory_module(8_589_934_592)
            .with_adapter(NetworkAdapter::new("169.254.10.1").with_mac("AA:AA:AA:AA:AA:01"))
            .with_adapter(
                NetworkAdapter::new("10.20.0.15")
                    .with_name("Ethernet")
                    .with_mask("255.255.255.0")
                    .with_gateway("10.20.0.1")
                    .with_dhcp(true)
                    .with_mac("AA:AA:AA:AA:AA:02"),
            )
            .with_processor(Processor::new("Core i7-1260P").with_cores(12).with_clock_mhz(2100))
            .with_os(OsInfo {
                product: Some("Windows 11 Pro".into()),
                version: Some("10.0.22631".into()),
                display_version: Some("23H2".into()),
                build_number: None,
            })
    }

    fn get<'a>(mapped: &'a MappedAttributes, path: &str) -> Option<&'a AttrValue> {
        lookup_path(&mapped.fields, path)
    }

    #[test]
    fn endpoint_table() {
        assert_eq!(endpoint_for(Classification::Laptop), Endpoint::Workstations);
        assert_eq!(endpoint_for(Classification::Desktop), Endpoint::Workstations);
        assert_eq!(endpoint_for(Classification::VirtualServer), Endpoint::VirtualMachines);
        assert_eq!(endpoint_for(Classification::PhysicalServer), Endpoint::Servers);
        assert_eq!(endpoint_for(Classification::NetworkDevice), Endpoint::Switches);
    }

    #[test]
    fn maps_identity_and_nested_fields() {
        let mapped = map_record(&laptop(), Classification::Laptop);

        assert_eq!(mapped.endpoint, Endpoint::Workstations);
        assert_eq!(mapped.name(), Some("LT-0042"));
        assert_eq!(mapped.serial_number(), Some("PF3ABC12"));
        assert_eq!(get(&mapped, "ip_address"), Some(&"10.20.0.15".into()));
        assert_eq!(get(&mapped, "mac_address"), Some(&"AA:AA:AA:AA:AA:01".into()));
        assert_eq!(get(&mapped, "operating_system.os"), Some(&"Windows 11 Pro".into()));
        assert_eq!(get(&mapped, "operating_system.service_pack"), Some(&"23H2".into()));
        assert_eq!(get(&mapped, "operating_system.build_number"), None);
        assert_eq!(
            get(&mapped, "computer_system.system_manufacturer"),
            Some(&"Lenovo".into())
        );
    }

    #[test]
    fn memory_is_exact_bytes() {
        let mapped = map_record(&laptop(), Classification::Laptop);
        assert_eq!(
            get(&mapped, "memory.physical_memory"),
            Some(&AttrValue::Integer(17_179_869_184))
        );
    }

    #[test]
    fn arrays_keep_length_and_order() {
        let mapped = map_record(&laptop(), Classification::Laptop);
        let Some(AttrValue::Array(adapters)) = mapped.fields.get("network_adapters") else {
            panic!("adapters missing");
        };
        assert_eq!(adapters.len(), 2);

        let first = adapters[0].as_map().unwrap();
        assert_eq!(first.get("name"), Some(&"NIC".into()));
        assert!(first.get("ip_address").is_none());

        let second = adapters[1].as_map().unwrap();
        assert_eq!(second.get("ip_address"), Some(&"10.20.0.15".into()));
        assert_eq!(second.get("ipnet_mask"), Some(&"255.255.255.0".into()));
        assert_eq!(second.get("dhcp"), Some(&AttrValue::Bool(true)));

        let Some(AttrValue::Array(cpus)) = mapped.fields.get("processors") else {
            panic!("processors missing");
        };
        assert_eq!(cpus.len(), 1);
        assert_eq!(
            cpus[0].as_map().unwrap().get("number_of_cores"),
            Some(&AttrValue::Integer(12))
        );
    }

    #[test]
    fn drops_hypervisor_identity() {
        let vm = SourceRecord::new("s-2", "srv-app-01")
            .with_kind("Server")
            .with_serial("VMware-42 1a 2b 3c 4d 5e 6f 70-81 92 a3 b4 c5 d6 e7 f8")
            .with_manufacturer("VMware, Inc.");
        let mapped = map_record(&vm, Classification::VirtualServer);

        assert_eq!(mapped.endpoint, Endpoint::VirtualMachines);
        assert_eq!(mapped.serial_number(), None);
        assert!(!mapped.fields.contains_key("computer_system"));
    }

    #[test]
    fn empty_record_maps_name_only() {
        let mapped = map_record(&SourceRecord::new("s-3", "bare"), Classification::Desktop);
        assert_eq!(mapped.fields.len(), 1);
        assert_eq!(mapped.name(), Some("bare"));
    }

    #[test]
    fn vendor_normalization() {
        assert_eq!(normalize_vendor(Some("Hewlett-Packard")), Some("HP"));
        assert_eq!(normalize_vendor(Some("Dell Inc.")), Some("Dell"));
        assert_eq!(normalize_vendor(Some("Apple")), Some("Apple"));
        assert_eq!(normalize_vendor(Some("QEMU")), None);
    }
}
