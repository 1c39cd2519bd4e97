//! Key lifecycle: one active key per authenticated identity.
//!
//! The manager is an ordinary value owned by the application context and
//! shared through `Arc`. It caches the active identity's key in memory and
//! keeps the device-local [`KeyStore`] in step with sign-in and sign-out.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::{
    error::VaultError,
    key::{Identity, VaultKey},
    key_store::KeyStore,
};

/// Prefix of the key store entry holding an identity's key.
pub const KEY_NAME_PREFIX: &str = "vault-key:";

/// Key store entry name for `identity`.
pub fn key_name(identity: &Identity) -> String {
    format!("{KEY_NAME_PREFIX}{identity}")
}

/// Key availability exposed to the application (readiness gating).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum KeyStatus {
    /// No key loaded; reads of encrypted records and all writes must wait.
    Unavailable,
    /// A key is loaded for `identity`.
    Ready { identity: Identity },
}

/// Sign-in / sign-out notifications from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    SignedIn(Identity),
    SignedOut,
}

/// The cached key together with the identity it belongs to.
///
/// Replaced wholesale, never mutated in place.
#[derive(Debug, Clone)]
struct ActiveKey {
    identity: Identity,
    key: Arc<VaultKey>,
}

/// Owns the active key and its device-local persistence.
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
    active: RwLock<Option<ActiveKey>>,
    /// Serializes `synchronize` and `reset` so two callers cannot both generate.
    lifecycle: Mutex<()>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            active: RwLock::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Ensure a key exists for `identity` and make it the active key.
    ///
    /// Loads the persisted key when present. A missing entry is filled with the
    /// cached key if it belongs to the same identity, otherwise with a freshly
    /// generated one. A corrupted entry is logged and replaced: records sealed
    /// under the lost key become unreadable, new records keep working.
    pub async fn synchronize(&self, identity: &Identity) -> Result<Arc<VaultKey>, VaultError> {
        let _guard = self.lifecycle.lock().await;
        let name = key_name(identity);

        // Another identity's key is dropped before any store I/O, so a failed
        // switch leaves no key active rather than the previous user's.
        let (cached, previous) = {
            let mut active = self.active.write().await;
            match active.as_ref() {
                Some(a) if &a.identity == identity => (Some(Arc::clone(&a.key)), None),
                _ => (None, active.take().map(|a| a.identity)),
            }
        };

        let persisted = match self.store.load(&name).await? {
            Some(encoded) => match VaultKey::from_base64(identity, &encoded) {
                Ok(key) => Some(key),
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        identity = %identity,
                        error = %e,
                        "stored key is corrupted, generating a new one; records sealed under the old key are no longer readable"
                    );
                    let _ = e;
                    None
                },
            },
            None => None,
        };

        let key = match (persisted, cached) {
            (Some(key), _) => Arc::new(key),
            (None, Some(cached)) => {
                self.store.save(&name, &cached.to_base64()).await?;
                #[cfg(feature = "tracing")]
                tracing::info!(identity = %identity, "restored missing key store entry from cache");
                cached
            },
            (None, None) => {
                let key = VaultKey::generate();
                self.store.save(&name, &key.to_base64()).await?;
                #[cfg(feature = "tracing")]
                tracing::info!(identity = %identity, "generated new vault key");
                Arc::new(key)
            },
        };

        *self.active.write().await = Some(ActiveKey {
            identity: identity.clone(),
            key: Arc::clone(&key),
        });

        match previous {
            Some(prev) => {
                #[cfg(feature = "tracing")]
                tracing::info!(from = %prev, to = %identity, "active identity switched");
                drop(prev);
            },
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(identity = %identity, "vault key synchronized");
            },
        }

        Ok(key)
    }

    /// The active key, whoever it belongs to.
    pub async fn active_key(&self) -> Result<Arc<VaultKey>, VaultError> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|a| Arc::clone(&a.key))
            .ok_or(VaultError::KeyUnavailable)
    }

    /// The active key, only if it belongs to `identity`.
    pub async fn active_key_for(&self, identity: &Identity) -> Result<Arc<VaultKey>, VaultError> {
        self.active
            .read()
            .await
            .as_ref()
            .filter(|a| &a.identity == identity)
            .map(|a| Arc::clone(&a.key))
            .ok_or(VaultError::KeyUnavailable)
    }

    pub async fn active_identity(&self) -> Option<Identity> {
        self.active.read().await.as_ref().map(|a| a.identity.clone())
    }

    pub async fn status(&self) -> KeyStatus {
        match self.active_identity().await {
            Some(identity) => KeyStatus::Ready { identity },
            None => KeyStatus::Unavailable,
        }
    }

    /// Drop the cached key and the active identity's persisted entry.
    ///
    /// No-op when nothing is active.
    pub async fn reset(&self) -> Result<(), VaultError> {
        let _guard = self.lifecycle.lock().await;

        let Some(previous) = self.active.write().await.take() else {
            return Ok(());
        };
        self.store.remove(&key_name(&previous.identity)).await?;

        #[cfg(feature = "tracing")]
        tracing::info!(identity = %previous.identity, "vault key reset");
        Ok(())
    }

    /// Remove `identity`'s persisted key without loading or generating one.
    ///
    /// Also drops the cached key when `identity` is the active one. Returns
    /// whether a persisted entry existed.
    pub async fn forget(&self, identity: &Identity) -> Result<bool, VaultError> {
        let _guard = self.lifecycle.lock().await;

        {
            let mut active = self.active.write().await;
            if active.as_ref().is_some_and(|a| &a.identity == identity) {
                active.take();
            }
        }
        let existed = self.store.remove(&key_name(identity)).await?;

        #[cfg(feature = "tracing")]
        tracing::info!(identity = %identity, existed, "vault key forgotten");
        Ok(existed)
    }

    /// Drive the lifecycle from identity provider notifications.
    pub async fn handle_event(&self, event: IdentityEvent) -> Result<KeyStatus, VaultError> {
        match event {
            IdentityEvent::SignedIn(identity) => {
                self.synchronize(&identity).await?;
            },
            IdentityEvent::SignedOut => self.reset().await?,
        }
        Ok(self.status().await)
    }
}
