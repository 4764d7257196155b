//! Source registry records.

use serde::{Deserialize, Serialize};

/// Immutable snapshot of one fleet device as reported by the source registry.
///
/// Field aliases accept the registry's own export names, so a raw export
/// can be loaded without a translation step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Registry identifier, used for selection and result reporting.
    #[serde(alias = "endpointId")]
    pub id: String,
    /// Primary name of the device.
    #[serde(alias = "friendlyName", default)]
    pub hostname: String,
    /// Hardware serial number.
    #[serde(alias = "serialNumber", default)]
    pub serial_number: Option<String>,
    /// Device kind as reported by the registry (`desktop`, `server`, ...).
    #[serde(alias = "endpointType", default)]
    pub kind: String,
    /// Hardware model string.
    #[serde(default)]
    pub model: Option<String>,
    /// Hardware manufacturer.
    #[serde(alias = "systemManufacturer", default)]
    pub manufacturer: Option<String>,
    /// BIOS vendor string.
    #[serde(alias = "biosVendor", default)]
    pub bios_vendor: Option<String>,
    /// Installed memory modules.
    #[serde(alias = "memoryModules", default)]
    pub memory_modules: Vec<MemoryModule>,
    /// Processors in registry order.
    #[serde(default)]
    pub processors: Vec<Processor>,
    /// Network adapters in registry order.
    #[serde(alias = "networkAdapters", default)]
    pub network_adapters: Vec<NetworkAdapter>,
    /// Operating system details.
    #[serde(alias = "operatingSystem", default)]
    pub os: Option<OsInfo>,
}

/// One installed memory module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryModule {
    /// Capacity in bytes.
    #[serde(alias = "size", default)]
    pub size_bytes: u64,
}

/// One processor package.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Processor {
    /// Processor name.
    #[serde(default)]
    pub name: String,
    /// Physical core count.
    #[serde(alias = "numberOfCores", default)]
    pub cores: Option<u32>,
    /// Clock speed in MHz.
    #[serde(alias = "maxClockSpeed", default)]
    pub clock_mhz: Option<u32>,
    /// Processor manufacturer.
    #[serde(default)]
    pub manufacturer: Option<String>,
}

/// One network adapter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkAdapter {
    /// Adapter name.
    #[serde(default)]
    pub name: Option<String>,
    /// IPv4 address.
    #[serde(alias = "ipAddress", default)]
    pub address: Option<String>,
    /// Subnet mask.
    #[serde(alias = "subnetMask", default)]
    pub mask: Option<String>,
    /// Default gateway.
    #[serde(alias = "defaultGateway", default)]
    pub gateway: Option<String>,
    /// Whether the address was assigned by DHCP.
    #[serde(alias = "dhcpEnabled", default)]
    pub dhcp: bool,
    /// Hardware address.
    #[serde(alias = "macAddress", default)]
    pub mac: Option<String>,
    /// Adapter description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Operating system details.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OsInfo {
    /// Product name (`Windows 11 Pro`).
    #[serde(alias = "osProduct", default)]
    pub product: Option<String>,
    /// Version string.
    #[serde(alias = "osVersion", default)]
    pub version: Option<String>,
    /// Marketing version (`23H2`).
    #[serde(alias = "displayVersion", default)]
    pub display_version: Option<String>,
    /// Build number.
    #[serde(alias = "buildNumber", default)]
    pub build_number: Option<String>,
}

impl SourceRecord {
    /// Creates a record with an id and hostname and nothing else.
    pub fn new(id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    /// Sets the device kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Sets the serial number.
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    /// Sets the model string.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the manufacturer.
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Sets the BIOS vendor.
    pub fn with_bios_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.bios_vendor = Some(vendor.into());
        self
    }

    /// Adds a memory module.
    pub fn with_memory_module(mut self, size_bytes: u64) -> Self {
        self.memory_modules.push(MemoryModule { size_bytes });
        self
    }

    /// Adds a processor.
    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processors.push(processor);
        self
    }

    /// Adds a network adapter.
    pub fn with_adapter(mut self, adapter: NetworkAdapter) -> Self {
        self.network_adapters.push(adapter);
        self
    }

    /// Sets the operating system details.
    pub fn with_os(mut self, os: OsInfo) -> Self {
        self.os = Some(os);
        self
    }

    /// Total installed memory in bytes.
    ///
    /// Returns `None` when no modules are reported or the sum overflows.
    pub fn total_memory_bytes(&self) -> Option<u64> {
        if self.memory_modules.is_empty() {
            return None;
        }
        self.memory_modules
            .iter()
            .try_fold(0u64, |acc, m| acc.checked_add(m.size_bytes))
    }
}

impl NetworkAdapter {
    /// Creates an adapter with an address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::default()
        }
    }

    /// Sets the adapter name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the subnet mask.
    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    /// Sets the default gateway.
    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }

    /// Sets the DHCP flag.
    pub fn with_dhcp(mut self, dhcp: bool) -> Self {
        self.dhcp = dhcp;
        self
    }

    /// Sets the hardware address.
    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }
}

impl Processor {
    /// Creates a processor with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the core count.
    pub fn with_cores(mut self, cores: u32) -> Self {
        self.cores = Some(cores);
        self
    }

    /// Sets the clock speed.
    pub fn with_clock_mhz(mut self, mhz: u32) -> Self {
        self.clock_mhz = Some(mhz);
        self
    }
}
