// ── Entity registry ──
//
// Flattens every reachable endpoint's accessory graph into a single
// queryable entity collection. A refresh rebuilds the whole snapshot off
// to the side and swaps it in atomically, so readers never observe a
// half-updated view. Writes are optimistic: after the bridge accepts a
// write, the cached state is patched in place rather than read back.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use homefly_api::types::{
    AccessoryGraph, Accessory, CharacteristicWrite, CHAR_BRIGHTNESS, CHAR_NAME, CHAR_ON,
    SERVICE_ACCESSORY_INFORMATION,
};
use homefly_api::{HapClient, TransportConfig};

use crate::config::CoreConfig;
use crate::discovery::{self, Endpoint};
use crate::error::CoreError;
use crate::model::{
    clamp_brightness, Entity, EntityId, EntityKind, EntityPatch, EntityState, ProtocolAddress,
};

// ── Snapshot ────────────────────────────────────────────────────────

/// One consistent view of the world: every entity plus the client for
/// each endpoint they came from.
#[derive(Default)]
struct Snapshot {
    entities: DashMap<EntityId, Entity>,
    clients: HashMap<String, Arc<HapClient>>,
}

// ── Registry ────────────────────────────────────────────────────────

/// Queryable, refreshable collection of controllable entities across
/// all discovered endpoints.
pub struct Registry {
    config: CoreConfig,
    snap: ArcSwap<Snapshot>,
}

impl Registry {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            snap: ArcSwap::from_pointee(Snapshot::default()),
        }
    }

    /// Rebuild the snapshot from scratch: rediscover endpoints, fetch
    /// every accessory graph concurrently, and swap the result in.
    /// An unreachable endpoint drops out of the snapshot with a warning;
    /// it does not fail the refresh. Returns the entity count.
    pub async fn refresh(&self, reason: &str) -> usize {
        debug!(reason, "registry refresh");
        let endpoints = discovery::discover(&self.config).await;

        let transport = TransportConfig {
            timeout: self.config.timeout,
        };

        let mut next = Snapshot::default();
        let mut fetches = Vec::with_capacity(endpoints.len());
        for endpoint in &endpoints {
            let client = match endpoint
                .base_url()
                .map_err(homefly_api::Error::from)
                .and_then(|url| HapClient::new(url, endpoint.pin.clone(), &transport))
            {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    warn!(endpoint = %endpoint.id, error = %e, "endpoint client unavailable; skipping");
                    continue;
                }
            };
            next.clients.insert(endpoint.id.clone(), Arc::clone(&client));
            fetches.push(async move { (endpoint, client.fetch_accessories().await) });
        }

        for (endpoint, result) in join_all(fetches).await {
            let graph = match result {
                Ok(graph) => graph,
                Err(e) => {
                    warn!(endpoint = %endpoint.id, error = %e, "accessory fetch failed; endpoint absent this refresh");
                    next.clients.remove(&endpoint.id);
                    continue;
                }
            };
            for entity in build_entities(endpoint, &graph) {
                next.entities.insert(entity.id.clone(), entity);
            }
        }

        disambiguate_names(&next.entities, &endpoints);

        let count = next.entities.len();
        self.snap.store(Arc::new(next));
        info!(reason, entities = count, endpoints = endpoints.len(), "registry refreshed");
        count
    }

    /// Look up one entity by id.
    pub fn get(&self, id: &EntityId) -> Option<Entity> {
        self.snap.load().entities.get(id).map(|e| e.clone())
    }

    /// List entities, optionally filtered by a case-insensitive
    /// substring match on name or id. Sorted by name, then id.
    pub fn list(&self, query: Option<&str>) -> Vec<Entity> {
        let snap = self.snap.load();
        let needle = query.map(str::to_lowercase);

        let mut entities: Vec<Entity> = snap
            .entities
            .iter()
            .filter(|e| match needle.as_deref() {
                Some(q) => {
                    e.name.to_lowercase().contains(q)
                        || e.id.to_string().to_lowercase().contains(q)
                }
                None => true,
            })
            .map(|e| e.clone())
            .collect();

        entities.sort_by(|a, b| {
            (a.name.to_lowercase(), &a.id).cmp(&(b.name.to_lowercase(), &b.id))
        });
        entities
    }

    /// Apply a state patch to one entity.
    ///
    /// Builds the characteristic writes from the entity's captured
    /// protocol address, sends them as one batch, and on success patches
    /// the cached state optimistically. Returns the updated entity.
    pub async fn set(&self, id: &EntityId, patch: EntityPatch) -> Result<Entity, CoreError> {
        if patch.is_empty() {
            return Err(CoreError::InvalidPatch {
                message: "patch sets neither power nor brightness".into(),
            });
        }

        let snap = self.snap.load_full();
        let entity = snap
            .entities
            .get(id)
            .map(|e| e.clone())
            .ok_or_else(|| CoreError::EntityNotFound { id: id.to_string() })?;
        let client = snap
            .clients
            .get(&entity.endpoint_id)
            .cloned()
            .ok_or_else(|| CoreError::EndpointUnavailable {
                endpoint: entity.endpoint_id.clone(),
            })?;

        let mut writes = Vec::with_capacity(2);
        if let Some(on) = patch.on {
            writes.push(CharacteristicWrite {
                aid: entity.address.aid,
                iid: entity.address.on_iid,
                value: serde_json::json!(on),
            });
        }
        let brightness = match patch.brightness {
            Some(raw) => {
                let Some(iid) = entity.address.brightness_iid else {
                    return Err(CoreError::UnsupportedCapability {
                        id: id.to_string(),
                        capability: "brightness",
                    });
                };
                let level = clamp_brightness(raw);
                writes.push(CharacteristicWrite {
                    aid: entity.address.aid,
                    iid,
                    value: serde_json::json!(level),
                });
                Some(level)
            }
            None => None,
        };

        client.write_characteristics(&writes).await?;

        // Optimistic update of the live snapshot. Reconciled by the
        // next refresh if the bridge disagrees.
        let mut updated = entity;
        if let Some(mut cached) = snap.entities.get_mut(id) {
            if let Some(on) = patch.on {
                cached.state.on = on;
            }
            if let Some(level) = brightness {
                cached.state.brightness = Some(level);
            }
            updated = cached.clone();
        }

        info!(entity = %id, on = ?patch.on, brightness = ?brightness, "entity state written");
        Ok(updated)
    }

    /// Periodic self-refresh until cancelled. An interval of zero
    /// disables it.
    pub fn spawn_refresh_task(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Option<tokio::task::JoinHandle<()>> {
        let secs = self.config.refresh_interval_secs;
        if secs == 0 {
            return None;
        }
        let registry = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(secs));
            ticker.tick().await; // immediate first tick, skip it
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        registry.refresh("interval").await;
                    }
                }
            }
        }))
    }

    #[cfg(test)]
    fn install(&self, entities: Vec<Entity>) {
        let mut snap = Snapshot::default();
        for entity in entities {
            snap.clients
                .entry(entity.endpoint_id.clone())
                .or_insert_with(|| {
                    let url = url::Url::parse("http://127.0.0.1:51826").expect("static test url");
                    let pin = secrecy::SecretString::from("031-45-154");
                    Arc::new(
                        HapClient::new(url, pin, &TransportConfig::default())
                            .expect("test client"),
                    )
                });
            snap.entities.insert(entity.id.clone(), entity);
        }
        self.snap.store(Arc::new(snap));
    }
}

// ── Graph flattening ────────────────────────────────────────────────

/// Flatten one endpoint's accessory graph into entities.
///
/// A service becomes an entity when its type maps to a supported kind
/// and it carries a writable power characteristic. Brightness is picked
/// up only on lights and only when writable.
fn build_entities(endpoint: &Endpoint, graph: &AccessoryGraph) -> Vec<Entity> {
    let mut entities = Vec::new();

    for accessory in &graph.accessories {
        let accessory_name = accessory_display_name(accessory);

        for service in &accessory.services {
            let Some(kind) =
                EntityKind::from_service_type(&homefly_api::types::short_type(&service.service_type))
            else {
                continue;
            };
            let Some(on) = service.characteristic(CHAR_ON).filter(|c| c.is_writable()) else {
                debug!(
                    endpoint = %endpoint.id, aid = accessory.aid, iid = service.iid,
                    "service has no writable power characteristic; skipping"
                );
                continue;
            };

            let brightness_char = (kind == EntityKind::Light)
                .then(|| service.characteristic(CHAR_BRIGHTNESS))
                .flatten()
                .filter(|c| c.is_writable());

            let name = match service.characteristic(CHAR_NAME).and_then(|c| c.as_str()) {
                Some(service_name) if service_name != accessory_name => {
                    format!("{accessory_name} - {service_name}")
                }
                _ => accessory_name.clone(),
            };

            entities.push(Entity {
                id: EntityId {
                    endpoint: endpoint.id.clone(),
                    aid: accessory.aid,
                    service_iid: service.iid,
                },
                name,
                kind,
                endpoint_id: endpoint.id.clone(),
                address: ProtocolAddress {
                    aid: accessory.aid,
                    service_iid: service.iid,
                    on_iid: on.iid,
                    brightness_iid: brightness_char.map(|c| c.iid),
                },
                state: EntityState {
                    on: on.as_bool().unwrap_or(false),
                    brightness: brightness_char
                        .and_then(homefly_api::types::Characteristic::as_i64)
                        .map(|v| clamp_brightness(v as f64)),
                },
            });
        }
    }

    entities
}

fn accessory_display_name(accessory: &Accessory) -> String {
    accessory
        .service(SERVICE_ACCESSORY_INFORMATION)
        .and_then(|info| info.characteristic(CHAR_NAME))
        .and_then(|c| c.as_str())
        .map_or_else(|| format!("Accessory {}", accessory.aid), str::to_owned)
}

/// Append the endpoint's display name to entities whose name collides
/// across the whole snapshot.
fn disambiguate_names(entities: &DashMap<EntityId, Entity>, endpoints: &[Endpoint]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for entity in entities.iter() {
        *counts.entry(entity.name.clone()).or_default() += 1;
    }

    let endpoint_names: HashMap<&str, &str> = endpoints
        .iter()
        .map(|e| (e.id.as_str(), e.name.as_str()))
        .collect();

    for mut entity in entities.iter_mut() {
        if counts.get(&entity.name).copied().unwrap_or(0) > 1 {
            if let Some(endpoint_name) = endpoint_names.get(entity.endpoint_id.as_str()) {
                entity.name = format!("{} ({endpoint_name})", entity.name);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn endpoint(id: &str, name: &str) -> Endpoint {
        Endpoint {
            id: id.into(),
            name: name.into(),
            address: "127.0.0.1".into(),
            port: 51_826,
            pin: SecretString::from("031-45-154"),
            role: crate::discovery::BridgeRole::Main,
        }
    }

    fn sample_graph() -> AccessoryGraph {
        serde_json::from_str(
            r#"{"accessories":[
                {"aid":2,"services":[
                    {"iid":1,"type":"3E","characteristics":[
                        {"iid":2,"type":"23","perms":["pr"],"value":"Kitchen Fan"}]},
                    {"iid":8,"type":"49","characteristics":[
                        {"iid":9,"type":"25","perms":["pr","pw"],"value":true}]}
                ]},
                {"aid":3,"services":[
                    {"iid":1,"type":"3E","characteristics":[
                        {"iid":2,"type":"23","perms":["pr"],"value":"Desk Lamp"}]},
                    {"iid":8,"type":"00000043-0000-1000-8000-0026BB765291","characteristics":[
                        {"iid":9,"type":"25","perms":["pr","pw"],"value":0},
                        {"iid":10,"type":"8","perms":["pr","pw"],"value":40}]}
                ]},
                {"aid":4,"services":[
                    {"iid":8,"type":"49","characteristics":[
                        {"iid":9,"type":"25","perms":["pr"],"value":false}]}
                ]}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn flattens_writable_services_only() {
        let entities = build_entities(&endpoint("AA11", "Main"), &sample_graph());

        // aid 4's switch has no writable power characteristic.
        assert_eq!(entities.len(), 2);

        let fan = &entities[0];
        assert_eq!(fan.name, "Kitchen Fan");
        assert_eq!(fan.kind, EntityKind::Switch);
        assert_eq!(fan.id.to_string(), "AA11:2:8");
        assert_eq!(fan.address.on_iid, 9);
        assert!(fan.address.brightness_iid.is_none());
        assert!(fan.state.on);

        let lamp = &entities[1];
        assert_eq!(lamp.kind, EntityKind::Light);
        assert_eq!(lamp.address.brightness_iid, Some(10));
        assert!(!lamp.state.on);
        assert_eq!(lamp.state.brightness, Some(40));
    }

    #[test]
    fn colliding_names_get_endpoint_suffix() {
        let main = endpoint("AA11", "Main");
        let child = endpoint("BB22", "Hue");
        let graph: AccessoryGraph = serde_json::from_str(
            r#"{"accessories":[{"aid":2,"services":[
                {"iid":1,"type":"3E","characteristics":[
                    {"iid":2,"type":"23","perms":["pr"],"value":"Lamp"}]},
                {"iid":8,"type":"49","characteristics":[
                    {"iid":9,"type":"25","perms":["pr","pw"],"value":false}]}
            ]}]}"#,
        )
        .unwrap();

        let entities = DashMap::new();
        for e in build_entities(&main, &graph)
            .into_iter()
            .chain(build_entities(&child, &graph))
        {
            entities.insert(e.id.clone(), e);
        }
        disambiguate_names(&entities, &[main, child]);

        let mut names: Vec<String> = entities.iter().map(|e| e.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["Lamp (Hue)", "Lamp (Main)"]);
    }

    #[test]
    fn list_filters_and_sorts() {
        let registry = Registry::new(CoreConfig::default());
        registry.install(build_entities(&endpoint("AA11", "Main"), &sample_graph()));

        let all = registry.list(None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Desk Lamp");
        assert_eq!(all[1].name, "Kitchen Fan");

        let fans = registry.list(Some("fan"));
        assert_eq!(fans.len(), 1);
        assert_eq!(fans[0].name, "Kitchen Fan");

        // Id substrings match too.
        let by_id = registry.list(Some("aa11:3"));
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].name, "Desk Lamp");

        assert!(registry.list(Some("garage")).is_empty());
    }

    #[tokio::test]
    async fn set_on_unknown_entity_fails() {
        let registry = Registry::new(CoreConfig::default());
        let id: EntityId = "AA11:2:8".parse().unwrap();
        let err = registry
            .set(
                &id,
                EntityPatch {
                    on: Some(true),
                    brightness: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::EntityNotFound { .. }));
    }

    #[tokio::test]
    async fn empty_patch_is_rejected() {
        let registry = Registry::new(CoreConfig::default());
        let id: EntityId = "AA11:2:8".parse().unwrap();
        let err = registry.set(&id, EntityPatch::default()).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidPatch { .. }));
    }

    #[tokio::test]
    async fn brightness_on_switch_is_unsupported() {
        let registry = Registry::new(CoreConfig::default());
        registry.install(build_entities(&endpoint("AA11", "Main"), &sample_graph()));

        let id: EntityId = "AA11:2:8".parse().unwrap();
        let err = registry
            .set(
                &id,
                EntityPatch {
                    on: None,
                    brightness: Some(50.0),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnsupportedCapability {
                capability: "brightness",
                ..
            }
        ));
    }
}
