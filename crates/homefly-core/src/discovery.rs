// ── Endpoint discovery ──
//
// Derives the list of reachable control endpoints from the host bridge
// configuration plus the persisted credential store. Re-run on every
// registry refresh; nothing here is cached or persisted by us.
//
// Discovery never fails: unreadable or malformed input degrades to an
// empty (or shorter) endpoint list with a warning.

use std::collections::HashSet;
use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::CoreConfig;

// ── Endpoint ────────────────────────────────────────────────────────

/// Whether an endpoint is the primary bridge or a child bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeRole {
    Main,
    Child,
}

/// One bridge process's local control endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Normalized bridge identity (uppercase alphanumerics only).
    pub id: String,
    /// Display name for the endpoint.
    pub name: String,
    pub address: String,
    pub port: u16,
    /// Shared secret (bridge PIN), sent verbatim on writes.
    pub pin: SecretString,
    pub role: BridgeRole,
}

impl Endpoint {
    /// Base URL for the endpoint's HTTP API.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("http://{}:{}", self.address, self.port))
    }
}

/// Normalize a bridge identity for comparison and file lookup:
/// uppercase, alphanumerics only (`"0e:aa:bb"` → `"0EAABB"`).
pub fn normalize_identity(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

// ── Host configuration shapes ───────────────────────────────────────

/// Bridge descriptor, shared by the primary `bridge` block and the
/// `_bridge` annotation on platform/accessory blocks.
#[derive(Debug, Default, Deserialize)]
struct BridgeBlock {
    #[serde(default)]
    name: Option<String>,
    /// Bridge identity (a MAC-style string in practice).
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    pin: Option<String>,
    #[serde(default)]
    port: Option<u16>,
}

/// A platform or accessory block; only its optional `_bridge`
/// annotation and display name matter here.
#[derive(Debug, Default, Deserialize)]
struct ChildCarrier {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    accessory: Option<String>,
    #[serde(rename = "_bridge", default)]
    bridge: Option<BridgeBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct HostConfig {
    #[serde(default)]
    bridge: Option<BridgeBlock>,
    #[serde(default)]
    platforms: Vec<ChildCarrier>,
    #[serde(default)]
    accessories: Vec<ChildCarrier>,
}

/// Persisted per-identity credential record
/// (`persist/AccessoryInfo.<ID>.json`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessoryInfoFile {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    pincode: Option<String>,
    #[serde(default)]
    port: Option<u16>,
}

// ── Discovery ───────────────────────────────────────────────────────

/// Produce the best-effort endpoint list for this run.
///
/// The primary bridge and every child bridge that declares an identity
/// go through the same resolution chain: explicit config first, then the
/// persisted credential store. Duplicate identities are suppressed
/// (first seen wins). Anything unresolvable is skipped with a warning.
pub async fn discover(config: &CoreConfig) -> Vec<Endpoint> {
    let raw = match tokio::fs::read(&config.config_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %config.config_path.display(), error = %e, "bridge config unreadable; no endpoints");
            return Vec::new();
        }
    };

    let host: HostConfig = match serde_json::from_slice(&raw) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %config.config_path.display(), error = %e, "bridge config malformed; no endpoints");
            return Vec::new();
        }
    };

    let mut endpoints = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    if let Some(ref main) = host.bridge {
        let name = main.name.clone().unwrap_or_else(|| "Homebridge".into());
        push_endpoint(
            &mut endpoints,
            &mut seen,
            config,
            main,
            name,
            BridgeRole::Main,
        )
        .await;
    }

    for carrier in host.platforms.iter().chain(host.accessories.iter()) {
        let Some(ref child) = carrier.bridge else {
            continue;
        };
        let name = child
            .name
            .clone()
            .or_else(|| carrier.name.clone())
            .or_else(|| carrier.platform.clone())
            .or_else(|| carrier.accessory.clone())
            .or_else(|| child.username.clone())
            .unwrap_or_else(|| "child bridge".into());
        push_endpoint(
            &mut endpoints,
            &mut seen,
            config,
            child,
            name,
            BridgeRole::Child,
        )
        .await;
    }

    debug!(count = endpoints.len(), "endpoint discovery complete");
    endpoints
}

async fn push_endpoint(
    endpoints: &mut Vec<Endpoint>,
    seen: &mut HashSet<String>,
    config: &CoreConfig,
    block: &BridgeBlock,
    name: String,
    role: BridgeRole,
) {
    let Some(ref identity) = block.username else {
        warn!(bridge = %name, "bridge declares no identity; skipping");
        return;
    };
    let id = normalize_identity(identity);
    if id.is_empty() {
        warn!(bridge = %name, identity, "bridge identity is empty after normalization; skipping");
        return;
    }
    if !seen.insert(id.clone()) {
        debug!(bridge = %name, id, "duplicate bridge identity; first seen wins");
        return;
    }

    // Explicit configuration wins; the credential store fills the gaps.
    let stored = if block.port.is_none() || block.pin.is_none() {
        load_credentials(&config.persist_dir, &id).await
    } else {
        None
    };

    let Some(port) = block.port.or(stored.as_ref().and_then(|s| s.port)) else {
        warn!(bridge = %name, id, "no resolvable port; skipping endpoint");
        return;
    };
    let Some(pin) = block
        .pin
        .clone()
        .or_else(|| stored.as_ref().and_then(|s| s.pincode.clone()))
    else {
        warn!(bridge = %name, id, "no resolvable pin; skipping endpoint");
        return;
    };

    endpoints.push(Endpoint {
        id,
        name,
        address: config.bridge_host.clone(),
        port,
        pin: SecretString::from(pin),
        role,
    });
}

/// Look up a persisted credential record for a normalized identity.
///
/// Fast path: the conventional file name. Fallback: scan every
/// `AccessoryInfo.*.json` in the store and match on the normalized
/// identity recorded inside.
async fn load_credentials(persist_dir: &Path, normalized: &str) -> Option<AccessoryInfoFile> {
    let exact = persist_dir.join(format!("AccessoryInfo.{normalized}.json"));
    if let Ok(bytes) = tokio::fs::read(&exact).await {
        match serde_json::from_slice(&bytes) {
            Ok(info) => return Some(info),
            Err(e) => warn!(path = %exact.display(), error = %e, "credential record malformed"),
        }
    }

    let mut dir = match tokio::fs::read_dir(persist_dir).await {
        Ok(dir) => dir,
        Err(e) => {
            debug!(path = %persist_dir.display(), error = %e, "credential store unreadable");
            return None;
        }
    };

    while let Ok(Some(entry)) = dir.next_entry().await {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !file_name.starts_with("AccessoryInfo.") || !file_name.ends_with(".json") {
            continue;
        }
        let Ok(bytes) = tokio::fs::read(entry.path()).await else {
            continue;
        };
        let Ok(info) = serde_json::from_slice::<AccessoryInfoFile>(&bytes) else {
            continue;
        };
        if info
            .username
            .as_deref()
            .is_some_and(|u| normalize_identity(u) == normalized)
        {
            return Some(info);
        }
    }

    None
}
