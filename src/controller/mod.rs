//! Controller module for MaskinportenClient reconciliation
//!
//! This module contains the controller loop, the resource model, and the
//! state builder and diff engine that converge API clients and secrets.

pub mod conditions;
pub mod diff;
#[cfg(test)]
mod diff_test;
mod finalizers;
#[cfg(feature = "metrics")]
pub mod metrics;
mod reconciler;
pub mod request;
pub mod resources;
#[cfg(test)]
mod resources_test;
pub mod secret_store;
pub mod state;

pub use diff::{DiffEngine, PartialReconcileError};
pub use finalizers::{FIELD_MANAGER, MASKINPORTEN_CLIENT_FINALIZER};
pub use reconciler::{run_controller, ControllerState, CONTROLLER_NAME};
pub use request::{MaskinportenClientRequest, OperatorContext, RequestLifecycleKind};
pub use resources::{
    ActionKind, ReconciliationAction, Resource, ResourceKind, ResourceSet, SecretResource,
    SECRET_DATA_KEY,
};
pub use secret_store::{InMemorySecretStore, KubeSecretStore, SecretStore};
pub use state::StateBuilder;
