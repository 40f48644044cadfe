//! Main reconciler for MaskinportenClient resources
//!
//! Implements the controller pattern using kube-rs runtime. Each
//! reconciliation maps the object to a request, builds the desired and
//! current resource sets, lets the diff engine apply the difference, and
//! records the outcome on the object's status.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use kube::{
    api::{Api, Patch, PatchParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    ResourceExt,
};
use tracing::{error, info, instrument, warn};

use super::conditions::set_condition;
use super::diff::DiffEngine;
use super::finalizers::{add_finalizer, has_finalizer, remove_finalizer, FIELD_MANAGER};
use super::request::{MaskinportenClientRequest, OperatorContext, RequestLifecycleKind};
use super::resources::ReconciliationAction;
use super::secret_store::{KubeSecretStore, SecretStore};
use super::state::StateBuilder;
use crate::crd::{Condition, MaskinportenClient, MaskinportenClientStatus};
use crate::error::{Error, Result};
use crate::maskinporten::{ClientRegistry, CredentialProvider};

pub const CONTROLLER_NAME: &str = "maskinportenclient";

pub const STATE_RECONCILED: &str = "reconciled";
pub const STATE_ERROR: &str = "error";

/// Periodic resync so secrets edited out of band are repaired.
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Shared state for the controller
pub struct ControllerState {
    pub client: Client,
    pub registry: Arc<ClientRegistry>,
    pub provider: Arc<CredentialProvider>,
    pub operator_context: OperatorContext,
    /// Watched namespace, all namespaces when `None`
    pub namespace: Option<String>,
    state_builder: StateBuilder,
    diff_engine: DiffEngine,
}

impl ControllerState {
    pub fn new(
        client: Client,
        registry: Arc<ClientRegistry>,
        provider: Arc<CredentialProvider>,
        operator_context: OperatorContext,
        namespace: Option<String>,
    ) -> Self {
        let secrets: Arc<dyn SecretStore> = Arc::new(KubeSecretStore::new(client.clone()));
        Self {
            state_builder: StateBuilder::new(Arc::clone(&registry), Arc::clone(&secrets)),
            diff_engine: DiffEngine::new(Arc::clone(&registry), secrets),
            client,
            registry,
            provider,
            operator_context,
            namespace,
        }
    }

    fn api(&self) -> Api<MaskinportenClient> {
        match self.namespace.as_deref() {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }
}

/// Main entry point to start the controller
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let clients = state.api();

    info!("Starting MaskinportenClient controller");

    // Verify CRD exists
    match clients.list(&Default::default()).await {
        Ok(_) => info!("MaskinportenClient CRD is available"),
        Err(e) => {
            error!(
                "MaskinportenClient CRD not found. Please install the CRD first: {:?}",
                e
            );
            return Err(Error::ConfigError(
                "MaskinportenClient CRD not installed".to_string(),
            ));
        }
    }

    Controller::new(clients, Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok(obj) => info!("Reconciled: {:?}", obj),
                Err(e) => error!("Reconcile error: {:?}", e),
            }
        })
        .await;

    Ok(())
}

/// The main reconciliation function
///
/// Called whenever a MaskinportenClient is created, updated, or marked for
/// deletion, and when the resync timer expires.
#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<MaskinportenClient>, ctx: Arc<ControllerState>) -> Result<Action> {
    let started = Instant::now();
    let result = reconcile_client(&obj, &ctx).await;

    #[cfg(feature = "metrics")]
    {
        super::metrics::observe_reconcile_duration_seconds(
            CONTROLLER_NAME,
            started.elapsed().as_secs_f64(),
        );
        super::metrics::set_registered_clients(ctx.registry.len());
    }
    #[cfg(not(feature = "metrics"))]
    let _ = started;

    result
}

async fn reconcile_client(obj: &MaskinportenClient, ctx: &ControllerState) -> Result<Action> {
    let lifecycle = RequestLifecycleKind::of(obj);
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let name = obj.name_any();

    info!(
        "Reconciling MaskinportenClient {}/{} ({})",
        namespace, name, lifecycle
    );

    // Deletion of an object we never took ownership of needs no cleanup.
    if lifecycle == RequestLifecycleKind::Delete && !has_finalizer(obj) {
        return Ok(Action::await_change());
    }

    let request = match MaskinportenClientRequest::from_object(obj, &ctx.operator_context) {
        Ok(request) => request,
        Err(e) => return Err(fail(ctx, obj, e).await),
    };

    if lifecycle != RequestLifecycleKind::Delete {
        if let Err(errors) = obj.spec.validate() {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            warn!("Validation failed for {}/{}: {}", namespace, name, message);
            return Err(fail(ctx, obj, Error::ValidationError(message)).await);
        }
    }

    if lifecycle == RequestLifecycleKind::Create {
        add_finalizer(&ctx.client, obj).await?;
    }

    let desired = match ctx
        .state_builder
        .compute_desired(&request, &obj.spec, lifecycle)
    {
        Ok(desired) => desired,
        Err(e) => return Err(fail(ctx, obj, e).await),
    };
    let current = match ctx.state_builder.fetch_current(&request).await {
        Ok(current) => current,
        Err(e) => return Err(fail(ctx, obj, e).await),
    };

    let actions = match ctx.diff_engine.reconcile(&current, &desired).await {
        Ok(actions) => actions,
        Err(partial) => {
            warn!(
                applied = partial.applied.len(),
                "Reconciliation of {}/{} stopped part way: {}",
                namespace,
                name,
                partial
                    .applied
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            record_actions(&partial.applied);
            return Err(fail(ctx, obj, partial.source).await);
        }
    };
    record_actions(&actions);

    if lifecycle == RequestLifecycleKind::Delete {
        remove_finalizer(&ctx.client, obj).await?;
        info!(
            "Removed credentials for MaskinportenClient {}/{} ({} actions)",
            namespace,
            name,
            actions.len()
        );
        return Ok(Action::await_change());
    }

    if actions.is_empty() {
        info!("No actions taken for {}/{}", namespace, name);
    }
    if !actions.is_empty() || needs_status_refresh(obj) {
        let status = reconciled_status(obj, actions.len());
        patch_status(&ctx.client, obj, &status).await?;
    }

    Ok(Action::requeue(RESYNC_INTERVAL))
}

/// Record `err` on the object's status and hand it back for the error policy.
async fn fail(ctx: &ControllerState, obj: &MaskinportenClient, err: Error) -> Error {
    error!("Reconciliation of MaskinportenClient failed: {}", err);
    let status = error_status(obj, &err);
    if let Err(status_err) = patch_status(&ctx.client, obj, &status).await {
        error!(
            "Failed to update MaskinportenClient status when encountering error: {}",
            status_err
        );
    }
    err
}

fn record_actions(actions: &[ReconciliationAction]) {
    for action in actions {
        info!(action = %action, "Applied reconciliation action");
        #[cfg(feature = "metrics")]
        super::metrics::inc_reconcile_action(action.kind.as_str(), action.resource.kind().as_str());
    }
}

/// True when the status does not yet reflect a successful run of this generation.
pub(crate) fn needs_status_refresh(obj: &MaskinportenClient) -> bool {
    match obj.status.as_ref() {
        Some(status) => {
            status.state.as_deref() != Some(STATE_RECONCILED)
                || status.observed_generation != obj.metadata.generation
        }
        None => true,
    }
}

pub(crate) fn reconciled_status(
    obj: &MaskinportenClient,
    action_count: usize,
) -> MaskinportenClientStatus {
    let mut status = obj.status.clone().unwrap_or_default();
    let reason = format!("Reconciled {action_count} resources");

    status.state = Some(STATE_RECONCILED.to_string());
    if action_count > 0 || status.last_synced.is_none() {
        status.last_synced = Some(chrono::Utc::now().to_rfc3339());
    }
    status.observed_generation = obj.metadata.generation;

    let mut ready = Condition::ready(true, "Reconciled", &reason);
    if let Some(generation) = obj.metadata.generation {
        ready = ready.with_observed_generation(generation);
    }
    set_condition(&mut status.conditions, ready);
    status.reason = Some(reason);
    status
}

pub(crate) fn error_status(obj: &MaskinportenClient, err: &Error) -> MaskinportenClientStatus {
    let mut status = obj.status.clone().unwrap_or_default();
    let message = err.to_string();

    status.state = Some(STATE_ERROR.to_string());
    let mut ready = Condition::ready(false, err.kind(), &message);
    if let Some(generation) = obj.metadata.generation {
        ready = ready.with_observed_generation(generation);
    }
    set_condition(&mut status.conditions, ready);
    status.reason = Some(message);
    status
}

async fn patch_status(
    client: &Client,
    obj: &MaskinportenClient,
    status: &MaskinportenClientStatus,
) -> Result<()> {
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<MaskinportenClient> = Api::namespaced(client.clone(), &namespace);

    let patch = serde_json::json!({ "status": status });
    api.patch_status(
        &obj.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await
    .map_err(Error::KubeError)?;

    Ok(())
}

/// Error policy for the controller
fn error_policy(obj: Arc<MaskinportenClient>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    error!("Reconciliation error for {}: {:?}", obj.name_any(), error);

    #[cfg(feature = "metrics")]
    super::metrics::inc_reconcile_error(CONTROLLER_NAME, error.kind());

    Action::requeue(requeue_after(error))
}

/// Shorter retry for retriable errors
pub(crate) fn requeue_after(error: &Error) -> Duration {
    if error.is_retriable() {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(60)
    }
}
