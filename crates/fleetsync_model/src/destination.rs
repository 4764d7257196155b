//! Destination CMDB records.

use crate::classification::Endpoint;
use crate::value::{lookup_path, AttrValue, Attributes};
use serde::{Deserialize, Deserializer, Serialize};

/// Current state of one destination asset as last fetched.
///
/// Identity fields are lifted out of the attribute tree; everything else
/// the API returns is kept in `attributes` with the same shape the mapper
/// produces, so the diff engine can walk both side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationRecord {
    /// Destination-assigned identifier. Numeric ids are kept as text.
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    /// Asset name.
    #[serde(default)]
    pub name: String,
    /// Asset serial number.
    #[serde(default)]
    pub serial_number: Option<String>,
    /// Collection the asset lives in, when the API reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    /// Remaining attributes.
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl DestinationRecord {
    /// Creates a record with an id and name and no attributes.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            serial_number: None,
            endpoint: None,
            attributes: Attributes::new(),
        }
    }

    /// Sets the serial number.
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    /// Sets the endpoint.
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets one top-level attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns the current value at a dotted field path.
    ///
    /// `name` and `serial_number` resolve to the identity fields.
    pub fn value_at(&self, path: &str) -> Option<AttrValue> {
        match path {
            "name" => Some(AttrValue::Text(self.name.clone())),
            "serial_number" => self.serial_number.clone().map(AttrValue::Text),
            _ => lookup_path(&self.attributes, path).cloned(),
        }
    }
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_id_becomes_text() {
        let record: DestinationRecord =
            serde_json::from_str(r#"{"id": 4021, "name": "WS-1"}"#).unwrap();
        assert_eq!(record.id, "4021");
        assert_eq!(record.name, "WS-1");
    }

    #[test]
    fn unknown_fields_land_in_attributes() {
        let json = r#"{
            "id": "9",
            "name": "srv-db-01",
            "serial_number": "CZ1234",
            "endpoint": "asset_servers",
            "operating_system": {"os": "Ubuntu", "version": "22.04"},
            "ip_address": "10.1.1.1"
        }"#;
        let record: DestinationRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.endpoint, Some(Endpoint::Servers));
        assert_eq!(
            record.value_at("operating_system.os"),
            Some(AttrValue::from("Ubuntu"))
        );
        assert_eq!(record.value_at("ip_address"), Some(AttrValue::from("10.1.1.1")));
        assert_eq!(record.value_at("serial_number"), Some(AttrValue::from("CZ1234")));
        assert!(!record.attributes.contains_key("name"));
    }

    #[test]
    fn missing_serial_is_none() {
        let record = DestinationRecord::new("1", "a");
        assert_eq!(record.value_at("serial_number"), None);
        assert_eq!(record.value_at("memory.physical_memory"), None);
    }
}
