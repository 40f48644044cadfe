//! In-memory registry of Maskinporten API clients keyed by AppId

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};
use uuid::Uuid;

use super::types::ClientInfo;
use crate::error::{Error, Result};

/// Owns every [`ClientInfo`] known to the operator. Internally synchronized;
/// the lock is never held across an await point.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, ClientInfo>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClientInfo>> {
        // The map holds plain data, so a panic elsewhere cannot leave it half updated.
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up the client registered for `app_id`.
    pub fn get(&self, app_id: &str) -> Result<Option<ClientInfo>> {
        // TODO: fetch the authoritative record from the Maskinporten self-service API
        // through CredentialProvider::authorized_request once client provisioning is remote.
        Ok(self.lock().get(app_id).cloned())
    }

    /// Create or update the client for `info.app_id`.
    ///
    /// Returns the stored record and whether it was created. A new record gets
    /// a fresh identifier; an existing one keeps its identifier and takes the
    /// declared scopes.
    pub fn reconcile(&self, info: &ClientInfo) -> Result<(ClientInfo, bool)> {
        if info.app_id.trim().is_empty() {
            return Err(Error::ValidationError(
                "cannot register a client without an app id".to_string(),
            ));
        }

        let mut clients = self.lock();
        match clients.get_mut(&info.app_id) {
            Some(existing) => {
                existing.scopes = info.scopes.clone();
                debug!(app_id = %info.app_id, client_id = %existing.id, "Updated client scopes");
                Ok((existing.clone(), false))
            }
            None => {
                let created = ClientInfo {
                    id: Uuid::new_v4().to_string(),
                    app_id: info.app_id.clone(),
                    scopes: info.scopes.clone(),
                };
                clients.insert(created.app_id.clone(), created.clone());
                info!(app_id = %created.app_id, client_id = %created.id, "Registered client");
                Ok((created, true))
            }
        }
    }

    /// Remove the client for `app_id`.
    pub fn delete(&self, app_id: &str) -> Result<()> {
        match self.lock().remove(app_id) {
            Some(removed) => {
                info!(app_id, client_id = %removed.id, "Deleted client");
                Ok(())
            }
            None => Err(Error::NotFoundError(app_id.to_string())),
        }
    }

    /// Snapshot of all clients ordered by AppId.
    pub fn list(&self) -> Vec<ClientInfo> {
        let mut clients: Vec<ClientInfo> = self.lock().values().cloned().collect();
        clients.sort_by(|a, b| a.app_id.cmp(&b.app_id));
        clients
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
