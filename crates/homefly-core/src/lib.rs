//! Core domain logic for homefly: endpoint discovery, the entity
//! registry, the durable one-shot scheduler, and the remediation
//! guardrail. Everything here is transport-agnostic policy; the raw
//! wire protocol lives in `homefly-api`, and all user interaction lives
//! in the `homefly` binary.

pub mod config;
pub mod discovery;
pub mod error;
pub mod guardrail;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use config::CoreConfig;
pub use error::CoreError;
pub use guardrail::{Guardrail, GuardrailConfig, Proposal, RemediationCommand};
pub use model::{Entity, EntityId, EntityKind, EntityPatch};
pub use registry::Registry;
pub use scheduler::{Action, ScheduledAction, Scheduler};
pub use store::StateStore;
