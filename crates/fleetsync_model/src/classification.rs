//! Device categories and destination endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Category tag derived from a source record.
///
/// The set is closed: every source record maps to exactly one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Portable workstation.
    Laptop,
    /// Stationary workstation. The default category.
    Desktop,
    /// Virtual machine running server workloads.
    VirtualServer,
    /// Bare-metal server.
    PhysicalServer,
    /// Switch, router or other network equipment.
    NetworkDevice,
    /// Phone or tablet.
    MobileDevice,
}

impl Classification {
    /// All categories, in declaration order.
    pub const ALL: [Classification; 6] = [
        Classification::Laptop,
        Classification::Desktop,
        Classification::VirtualServer,
        Classification::PhysicalServer,
        Classification::NetworkDevice,
        Classification::MobileDevice,
    ];

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Classification::Laptop => "Laptop",
            Classification::Desktop => "Desktop",
            Classification::VirtualServer => "Virtual Server",
            Classification::PhysicalServer => "Physical Server",
            Classification::NetworkDevice => "Network Device",
            Classification::MobileDevice => "Mobile Device",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Destination CMDB endpoint (asset type collection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Endpoint {
    /// `asset_workstations`
    #[serde(rename = "asset_workstations")]
    Workstations,
    /// `asset_virtual_machines`
    #[serde(rename = "asset_virtual_machines")]
    VirtualMachines,
    /// `asset_servers`
    #[serde(rename = "asset_servers")]
    Servers,
    /// `asset_switches`
    #[serde(rename = "asset_switches")]
    Switches,
    /// `asset_mobile_devices`
    #[serde(rename = "asset_mobile_devices")]
    MobileDevices,
}

impl Endpoint {
    /// All endpoints.
    pub const ALL: [Endpoint; 5] = [
        Endpoint::Workstations,
        Endpoint::VirtualMachines,
        Endpoint::Servers,
        Endpoint::Switches,
        Endpoint::MobileDevices,
    ];

    /// Collection name as used in API paths.
    pub fn api_name(self) -> &'static str {
        match self {
            Endpoint::Workstations => "asset_workstations",
            Endpoint::VirtualMachines => "asset_virtual_machines",
            Endpoint::Servers => "asset_servers",
            Endpoint::Switches => "asset_switches",
            Endpoint::MobileDevices => "asset_mobile_devices",
        }
    }

    /// Payload wrapper key: the collection name without its trailing `s`.
    pub fn singular(self) -> &'static str {
        let name = self.api_name();
        name.strip_suffix('s').unwrap_or(name)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Error returned when parsing an unknown endpoint name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown endpoint: {0}")]
pub struct ParseEndpointError(pub String);

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.api_name() == s)
            .ok_or_else(|| ParseEndpointError(s.to_string()))
    }
}
