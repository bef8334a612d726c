//! Credential vault for the bearer token pair.
//!
//! This module provides:
//! - `SecretStore`: the synchronous backend contract
//! - `KeyringStore`: OS keychain storage via keyring
//! - `FileStore`: durable JSON fallback for platforms without a keychain
//! - `MemoryStore`: process-local storage for tests and throwaway sessions
//! - `Vault`: the async facade the session store and API client share
//!
//! Absence is never an error: a missing token reads as `None` and deleting
//! a missing token succeeds.

pub mod file;
pub mod keychain;
pub mod memory;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::AuthTokens;

pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;

/// The two entries the vault knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKey {
    Access,
    Refresh,
}

impl TokenKey {
    pub const ALL: [TokenKey; 2] = [TokenKey::Access, TokenKey::Refresh];

    /// Name the entry is persisted under
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKey::Access => "access_token",
            TokenKey::Refresh => "refresh_token",
        }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Token file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Vault task failed: {0}")]
    Task(String),

    #[error("No location available for the token file")]
    NoTokenFile,
}

/// Storage backend for vault entries.
///
/// Implementations are blocking; `Vault` moves every call onto the
/// blocking pool.
pub trait SecretStore: Send + Sync {
    /// Short backend name for log output
    fn name(&self) -> &'static str;

    fn get(&self, key: TokenKey) -> Result<Option<String>, VaultError>;

    fn set(&self, key: TokenKey, value: &str) -> Result<(), VaultError>;

    /// Remove an entry. Removing an absent entry is a no-op.
    fn delete(&self, key: TokenKey) -> Result<(), VaultError>;
}

/// Which backend a `Vault` should be built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultBackend {
    /// Keychain when the platform has one, token file otherwise
    #[default]
    Auto,
    Keyring,
    File,
    Memory,
}

impl FromStr for VaultBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(VaultBackend::Auto),
            "keyring" | "keychain" => Ok(VaultBackend::Keyring),
            "file" => Ok(VaultBackend::File),
            "memory" => Ok(VaultBackend::Memory),
            other => Err(format!("unknown vault backend: {}", other)),
        }
    }
}

/// Async handle to the token store.
/// Clone is cheap - the backend sits behind an Arc.
#[derive(Clone)]
pub struct Vault {
    store: Arc<dyn SecretStore>,
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("backend", &self.store.name())
            .finish()
    }
}

impl Vault {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Vault backed by an in-memory map
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Build a vault for the requested backend.
    ///
    /// `file_path` is where the file backend keeps its tokens, both when
    /// chosen explicitly and when `Auto` falls back to it. It is only
    /// consulted by those two paths. `File` without a path is an error;
    /// `Auto` without one falls back to memory.
    pub fn open(backend: VaultBackend, file_path: Option<PathBuf>) -> Result<Self, VaultError> {
        let store: Arc<dyn SecretStore> = match backend {
            VaultBackend::Keyring => Arc::new(KeyringStore::new()),
            VaultBackend::File => Arc::new(FileStore::new(file_path.ok_or(VaultError::NoTokenFile)?)),
            VaultBackend::Memory => Arc::new(MemoryStore::new()),
            VaultBackend::Auto => match (KeyringStore::probe(), file_path) {
                (Ok(store), _) => Arc::new(store),
                (Err(e), Some(path)) => {
                    warn!(error = %e, path = ?path, "Keychain unavailable, storing tokens in file");
                    Arc::new(FileStore::new(path))
                }
                (Err(e), None) => {
                    warn!(error = %e, "Keychain and token file unavailable, tokens will not persist");
                    Arc::new(MemoryStore::new())
                }
            },
        };
        debug!(backend = store.name(), "Vault opened");
        Ok(Self { store })
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    async fn run<T, F>(&self, op: F) -> Result<T, VaultError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SecretStore) -> Result<T, VaultError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| VaultError::Task(e.to_string()))?
    }

    /// Read an entry. Empty values read as absent.
    pub async fn get(&self, key: TokenKey) -> Result<Option<String>, VaultError> {
        let value = self.run(move |store| store.get(key)).await?;
        Ok(value.filter(|v| !v.is_empty()))
    }

    pub async fn set(&self, key: TokenKey, value: &str) -> Result<(), VaultError> {
        let value = value.to_string();
        self.run(move |store| store.set(key, &value)).await
    }

    pub async fn delete(&self, key: TokenKey) -> Result<(), VaultError> {
        self.run(move |store| store.delete(key)).await
    }

    /// Delete both entries. Both deletes are attempted; the first failure is returned.
    pub async fn clear_all(&self) -> Result<(), VaultError> {
        let (access, refresh) =
            futures::join!(self.delete(TokenKey::Access), self.delete(TokenKey::Refresh));
        access.and(refresh)
    }

    pub async fn access_token(&self) -> Result<Option<String>, VaultError> {
        self.get(TokenKey::Access).await
    }

    pub async fn refresh_token(&self) -> Result<Option<String>, VaultError> {
        self.get(TokenKey::Refresh).await
    }

    /// Both tokens, or `None` unless both are present
    pub async fn tokens(&self) -> Result<Option<(String, String)>, VaultError> {
        let access = self.access_token().await?;
        let refresh = self.refresh_token().await?;
        Ok(access.zip(refresh))
    }

    /// Persist a freshly issued token pair
    pub async fn store_tokens(&self, tokens: &AuthTokens) -> Result<(), VaultError> {
        let (access, refresh) = futures::join!(
            self.set(TokenKey::Access, &tokens.access_token),
            self.set(TokenKey::Refresh, &tokens.refresh_token)
        );
        access.and(refresh)
    }
}
