//! Live sessions of this process.
//!
//! Each session sits behind its own `tokio::sync::Mutex`, so operations on
//! one session are serialized while different sessions proceed in
//! parallel. A session that is not live is restored from its draft on
//! first access.

use std::collections::HashMap;
use std::sync::Arc;

use onboard_core::onboarding_wizard::Transition;
use onboard_db::DraftStore;
use tokio::sync::{Mutex, RwLock};

use crate::context::{Collaborators, SessionSettings};
use crate::error::SessionError;
use crate::session::{OpenRequest, WizardSession};

pub type SharedSession = Arc<Mutex<WizardSession>>;

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
    store: DraftStore,
    collaborators: Collaborators,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(store: DraftStore, collaborators: Collaborators, settings: SessionSettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
            collaborators,
            settings,
        }
    }

    pub fn store(&self) -> &DraftStore {
        &self.store
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn live(&self, key: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Keep `session` unless another task registered the same key first,
    /// in which case ours is closed and the existing one returned.
    async fn register(&self, mut session: WizardSession) -> SharedSession {
        let key = session.key().to_string();
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&key) {
            let existing = Arc::clone(existing);
            drop(sessions);
            if let Err(e) = session.close().await {
                tracing::warn!(session_key = %key, error = %e, "Duplicate session close failed");
            }
            return existing;
        }
        let shared = Arc::new(Mutex::new(session));
        sessions.insert(key, Arc::clone(&shared));
        shared
    }

    /// Open or reattach to a session.
    pub async fn open(&self, request: OpenRequest) -> Result<SharedSession, SessionError> {
        if let Some(key) = WizardSession::key_for(&request) {
            if let Some(existing) = self.live(&key).await {
                return Ok(existing);
            }
        }
        let session = WizardSession::open(
            request,
            self.store.clone(),
            self.collaborators.clone(),
            &self.settings,
        )
        .await?;
        Ok(self.register(session).await)
    }

    /// Look up a session, restoring it from its draft when it is not live.
    pub async fn get(&self, key: &str) -> Result<SharedSession, SessionError> {
        if let Some(existing) = self.live(key).await {
            return Ok(existing);
        }
        let session = WizardSession::resume(
            key,
            self.store.clone(),
            self.collaborators.clone(),
            &self.settings,
        )
        .await?
        .ok_or_else(|| SessionError::NotFound(key.to_string()))?;
        Ok(self.register(session).await)
    }

    /// Submit a session. The session lock is released while the CRM call
    /// runs; the in-flight flag rejects a concurrent second submit.
    pub async fn submit(&self, key: &str) -> Result<Transition, SessionError> {
        let shared = self.get(key).await?;
        let pending = shared.lock().await.prepare_submission()?;
        let delivered = pending.deliver().await?;
        let mut session = shared.lock().await;
        session.complete_submission(delivered).await
    }

    /// Drop a session from the registry after flushing its autosave.
    pub async fn close(&self, key: &str) -> Result<(), SessionError> {
        let removed = self.sessions.write().await.remove(key);
        if let Some(shared) = removed {
            shared.lock().await.close().await?;
        }
        Ok(())
    }

    /// Close every live session.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, SharedSession)> =
            self.sessions.write().await.drain().collect();
        let count = drained.len();
        for (key, shared) in drained {
            if let Err(e) = shared.lock().await.close().await {
                tracing::error!(session_key = %key, error = %e, "Session close failed");
            }
        }
        tracing::info!(count, "All sessions closed");
    }
}
