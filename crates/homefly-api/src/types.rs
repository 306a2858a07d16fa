// HAP wire types
//
// Models for the accessory database returned by `GET /accessories` and the
// batch-write request/response of `PUT /characteristics`. Fields use
// `#[serde(default)]` liberally because bridges are inconsistent about
// field presence across versions.

use serde::{Deserialize, Serialize};

// ── Well-known type codes ────────────────────────────────────────────

/// Apple-defined HAP base UUID suffix. Bridges may report types either in
/// the short form (`"43"`) or as the full UUID
/// (`"00000043-0000-1000-8000-0026BB765291"`).
const HAP_BASE_UUID_SUFFIX: &str = "-0000-1000-8000-0026BB765291";

/// Accessory Information service (carries the accessory's display name).
pub const SERVICE_ACCESSORY_INFORMATION: &str = "3E";
/// Switch service.
pub const SERVICE_SWITCH: &str = "49";
/// Lightbulb service.
pub const SERVICE_LIGHTBULB: &str = "43";
/// Outlet service.
pub const SERVICE_OUTLET: &str = "47";

/// On/off power characteristic (boolean).
pub const CHAR_ON: &str = "25";
/// Brightness characteristic (0–100 integer percentage).
pub const CHAR_BRIGHTNESS: &str = "8";
/// Name characteristic (string).
pub const CHAR_NAME: &str = "23";

/// The paired-write permission flag. Only characteristics carrying it
/// accept writes.
pub const PERM_PAIRED_WRITE: &str = "pw";

/// Per-write status code meaning success in a 207 multi-status response.
pub const STATUS_SUCCESS: i64 = 0;

/// Normalize a HAP type code to its short uppercase form.
///
/// Strips the Apple base-UUID suffix and leading zeros, so `"43"`,
/// `"0043"`, and `"00000043-0000-1000-8000-0026BB765291"` all compare
/// equal.
pub fn short_type(raw: &str) -> String {
    let upper = raw.to_ascii_uppercase();
    let stem = upper
        .strip_suffix(HAP_BASE_UUID_SUFFIX)
        .unwrap_or(upper.as_str());
    let trimmed = stem.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}

// ── Accessory graph (GET /accessories) ───────────────────────────────

/// Full accessory database: `{ "accessories": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessoryGraph {
    pub accessories: Vec<Accessory>,
}

/// One accessory, identified by `aid` within its bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct Accessory {
    pub aid: u64,
    #[serde(default)]
    pub services: Vec<Service>,
}

/// A service on an accessory, identified by `iid` within the accessory.
#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    pub iid: u64,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub characteristics: Vec<Characteristic>,
}

/// A single typed, addressable property on a service.
#[derive(Debug, Clone, Deserialize)]
pub struct Characteristic {
    pub iid: u64,
    #[serde(rename = "type")]
    pub characteristic_type: String,
    #[serde(default)]
    pub perms: Vec<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl Accessory {
    /// Find a service by its normalized short type code.
    pub fn service(&self, short: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| short_type(&s.service_type) == short)
    }
}

impl Service {
    /// Find a characteristic by its normalized short type code.
    pub fn characteristic(&self, short: &str) -> Option<&Characteristic> {
        self.characteristics
            .iter()
            .find(|c| short_type(&c.characteristic_type) == short)
    }
}

impl Characteristic {
    /// Whether this characteristic accepts paired writes.
    pub fn is_writable(&self) -> bool {
        self.perms.iter().any(|p| p == PERM_PAIRED_WRITE)
    }

    /// The current value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(serde_json::Value::as_str)
    }

    /// The current value coerced to a boolean. Bridges report booleans
    /// either as JSON `true`/`false` or as `0`/`1`.
    pub fn as_bool(&self) -> Option<bool> {
        match self.value.as_ref()? {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::Number(n) => n.as_i64().map(|v| v != 0),
            _ => None,
        }
    }

    /// The current value coerced to an integer.
    pub fn as_i64(&self) -> Option<i64> {
        self.value.as_ref().and_then(serde_json::Value::as_i64)
    }
}

// ── Characteristic writes (PUT /characteristics) ─────────────────────

/// One entry of a batch characteristic write.
#[derive(Debug, Clone, Serialize)]
pub struct CharacteristicWrite {
    pub aid: u64,
    pub iid: u64,
    pub value: serde_json::Value,
}

/// Request body for `PUT /characteristics`.
#[derive(Debug, Serialize)]
pub(crate) struct WriteRequest<'a> {
    pub characteristics: &'a [CharacteristicWrite],
}

/// Per-write result from a 207 multi-status response.
#[derive(Debug, Clone, Deserialize)]
pub struct WriteStatus {
    pub aid: u64,
    pub iid: u64,
    pub status: i64,
}

/// Response body of a 207 multi-status write.
#[derive(Debug, Deserialize)]
pub(crate) struct WriteResponse {
    pub characteristics: Vec<WriteStatus>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn short_type_strips_base_uuid() {
        assert_eq!(short_type("00000043-0000-1000-8000-0026BB765291"), "43");
        assert_eq!(short_type("0000003e-0000-1000-8000-0026bb765291"), "3E");
    }

    #[test]
    fn short_type_passes_short_forms_through() {
        assert_eq!(short_type("43"), "43");
        assert_eq!(short_type("0043"), "43");
        assert_eq!(short_type("8"), "8");
    }

    #[test]
    fn short_type_all_zeros() {
        assert_eq!(short_type("00"), "0");
    }

    #[test]
    fn characteristic_bool_coercion() {
        let c = Characteristic {
            iid: 9,
            characteristic_type: "25".into(),
            perms: vec!["pr".into(), "pw".into()],
            value: Some(serde_json::json!(1)),
        };
        assert_eq!(c.as_bool(), Some(true));
        assert!(c.is_writable());
    }

    #[test]
    fn graph_deserializes_from_bridge_json() {
        let graph: AccessoryGraph = serde_json::from_str(
            r#"{"accessories":[{"aid":2,"services":[
                {"iid":1,"type":"3E","characteristics":[
                    {"iid":2,"type":"23","perms":["pr"],"value":"Kitchen Fan"}]},
                {"iid":8,"type":"49","characteristics":[
                    {"iid":9,"type":"25","perms":["pr","pw","ev"],"value":false}]}
            ]}]}"#,
        )
        .unwrap();

        let acc = &graph.accessories[0];
        assert_eq!(acc.aid, 2);
        let info = acc.service(SERVICE_ACCESSORY_INFORMATION).unwrap();
        assert_eq!(
            info.characteristic(CHAR_NAME).unwrap().as_str(),
            Some("Kitchen Fan")
        );
        let switch = acc.service(SERVICE_SWITCH).unwrap();
        assert_eq!(switch.characteristic(CHAR_ON).unwrap().as_bool(), Some(false));
    }
}
