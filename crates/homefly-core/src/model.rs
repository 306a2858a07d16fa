// ── Domain model ──
//
// Controllable entities are plain data, addressed by a composite id that
// stays stable across refreshes as long as the underlying accessory and
// service numbering is stable. No host-side accessory object graph leaks
// through here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use homefly_api::types::{SERVICE_LIGHTBULB, SERVICE_OUTLET, SERVICE_SWITCH};

// ── EntityId ────────────────────────────────────────────────────────

/// Composite entity identifier: `endpoint:accessory-id:service-iid`.
///
/// The endpoint part is a normalized bridge identity (uppercase
/// alphanumerics only), so the separator is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EntityId {
    pub endpoint: String,
    pub aid: u64,
    pub service_iid: u64,
}

/// Error parsing an [`EntityId`] from its string form.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid entity id '{raw}': expected endpoint:aid:service-iid")]
pub struct ParseEntityIdError {
    pub raw: String,
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.endpoint, self.aid, self.service_iid)
    }
}

impl FromStr for EntityId {
    type Err = ParseEntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseEntityIdError { raw: s.to_owned() };

        let mut parts = s.split(':');
        let endpoint = parts.next().filter(|p| !p.is_empty()).ok_or_else(err)?;
        let aid = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(err)?;
        let service_iid = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(err)?;
        if parts.next().is_some() {
            return Err(err());
        }

        Ok(Self {
            endpoint: endpoint.to_owned(),
            aid,
            service_iid,
        })
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for EntityId {
    type Error = ParseEntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ── EntityKind ──────────────────────────────────────────────────────

/// The three supported controllable service kinds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    Switch,
    Light,
    Outlet,
}

impl EntityKind {
    /// Map a normalized short service type to a supported kind.
    pub fn from_service_type(short: &str) -> Option<Self> {
        match short {
            t if t == SERVICE_SWITCH => Some(Self::Switch),
            t if t == SERVICE_LIGHTBULB => Some(Self::Light),
            t if t == SERVICE_OUTLET => Some(Self::Outlet),
            _ => None,
        }
    }
}

// ── Entity ──────────────────────────────────────────────────────────

/// Wire address of an entity's writable characteristics within its
/// endpoint. Captured at lookup time, so an in-flight write keeps
/// targeting real hardware even if the registry refreshes underneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolAddress {
    pub aid: u64,
    pub service_iid: u64,
    pub on_iid: u64,
    /// Present only on `light` entities whose service exposes brightness.
    pub brightness_iid: Option<u64>,
}

/// Last state observed from the bridge, optimistically updated after a
/// successful write and reconciled by the next refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityState {
    pub on: bool,
    pub brightness: Option<u8>,
}

/// A controllable power (and optionally brightness) unit exposed by a
/// bridge endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub endpoint_id: String,
    pub address: ProtocolAddress,
    pub state: EntityState,
}

// ── EntityPatch ─────────────────────────────────────────────────────

/// A requested state change: power and/or brightness.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EntityPatch {
    pub on: Option<bool>,
    pub brightness: Option<f64>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.on.is_none() && self.brightness.is_none()
    }
}

/// Clamp a requested brightness into `[0, 100]` and round to an integer
/// before it goes on the wire.
pub fn clamp_brightness(value: f64) -> u8 {
    value.clamp(0.0, 100.0).round() as u8
}
