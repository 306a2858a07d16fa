//! Async client for the Homebridge accessory API.
//!
//! Homebridge in insecure mode (`-I`) exposes the HAP accessory database
//! over plain local HTTP: `GET /accessories` returns the full
//! accessory/service/characteristic graph, `PUT /characteristics` writes a
//! batch of characteristic values with the bridge PIN sent verbatim as the
//! `Authorization` header. This crate covers exactly those two operations
//! plus their status-code semantics (204 full success, 207 multi-status
//! with per-write result codes).
//!
//! Retry and refresh policy live in `homefly-core` — this layer reports
//! each request's outcome once and precisely.

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::HapClient;
pub use error::Error;
pub use transport::TransportConfig;
pub use types::{
    Accessory, AccessoryGraph, Characteristic, CharacteristicWrite, Service, WriteStatus,
};
