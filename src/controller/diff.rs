//! Diff engine that converges current resources to the desired set
//!
//! The forward pass walks the desired resources and creates or updates what
//! differs. The reverse pass walks the current resources and removes what is
//! no longer desired. Every change is applied immediately and recorded as a
//! [`ReconciliationAction`]; the first failure stops the run and hands back
//! the actions applied so far.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::resources::{ReconciliationAction, Resource, ResourceSet, SecretResource};
use super::secret_store::SecretStore;
use crate::error::Error;
use crate::maskinporten::{ClientInfo, ClientRegistry};

/// A reconciliation that failed after applying `applied`.
#[derive(Debug, Error)]
#[error("reconciliation stopped after {} applied action(s): {source}", .applied.len())]
pub struct PartialReconcileError {
    pub applied: Vec<ReconciliationAction>,
    pub source: Error,
}

pub struct DiffEngine {
    registry: Arc<ClientRegistry>,
    secrets: Arc<dyn SecretStore>,
}

impl DiffEngine {
    pub fn new(registry: Arc<ClientRegistry>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { registry, secrets }
    }

    /// Apply the changes that take `current` to `desired`.
    ///
    /// Upserts come before deletes. Running again with freshly fetched state
    /// yields no actions.
    pub async fn reconcile(
        &self,
        current: &ResourceSet,
        desired: &ResourceSet,
    ) -> Result<Vec<ReconciliationAction>, PartialReconcileError> {
        let mut applied = Vec::new();

        if let Err(source) = self.apply_forward(current, desired, &mut applied).await {
            return Err(PartialReconcileError { applied, source });
        }
        if let Err(source) = self.apply_reverse(current, desired, &mut applied).await {
            return Err(PartialReconcileError { applied, source });
        }

        info!(actions = applied.len(), "Diff applied");
        Ok(applied)
    }

    async fn apply_forward(
        &self,
        current: &ResourceSet,
        desired: &ResourceSet,
        applied: &mut Vec<ReconciliationAction>,
    ) -> crate::Result<()> {
        let mut registered: Option<ClientInfo> = None;

        for resource in desired.iter() {
            match resource {
                Resource::ApiClient(info) => {
                    let (resulting, created) = self.registry.reconcile(info)?;
                    if created || !resulting.same_declaration(info) {
                        debug!(app_id = %resulting.app_id, created, "API client upserted");
                        applied.push(ReconciliationAction::upsert(Resource::ApiClient(
                            resulting.clone(),
                        )));
                    }
                    registered = Some(resulting);
                }
                Resource::Secret(wanted) => {
                    let Some(declared_payload) = wanted.payload() else {
                        continue;
                    };
                    // The registry result carries the assigned client id.
                    let payload = match &registered {
                        Some(info) => serde_json::to_vec(info)?,
                        None => declared_payload.to_vec(),
                    };

                    let existing = current
                        .secret()
                        .ok_or_else(|| Error::MissingSecretError(wanted.display_name()))?;
                    if existing.payload() == Some(payload.as_slice()) {
                        continue;
                    }

                    let updated = existing.with_payload(payload);
                    let stored = self.secrets.update(&updated.secret).await?;
                    debug!(secret = %updated.display_name(), "Secret payload written");
                    applied.push(ReconciliationAction::upsert(Resource::Secret(
                        SecretResource::new(stored),
                    )));
                }
            }
        }
        Ok(())
    }

    async fn apply_reverse(
        &self,
        current: &ResourceSet,
        desired: &ResourceSet,
        applied: &mut Vec<ReconciliationAction>,
    ) -> crate::Result<()> {
        for resource in current.iter() {
            match resource {
                Resource::ApiClient(info) => {
                    if desired.api_client().is_some() {
                        continue;
                    }
                    self.registry.delete(&info.app_id)?;
                    applied.push(ReconciliationAction::delete(Resource::ApiClient(
                        info.clone(),
                    )));
                }
                Resource::Secret(existing) => {
                    let still_wanted = desired.secret().is_some_and(SecretResource::has_payload);
                    if still_wanted || !existing.has_payload() {
                        continue;
                    }
                    let stripped = existing.without_payload();
                    let stored = self.secrets.update(&stripped.secret).await?;
                    debug!(secret = %stripped.display_name(), "Secret payload removed");
                    applied.push(ReconciliationAction::delete(Resource::Secret(
                        SecretResource::new(stored),
                    )));
                }
            }
        }
        Ok(())
    }
}
