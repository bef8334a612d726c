use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{SecretStore, TokenKey, VaultError};

/// Process-local token storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<TokenKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<TokenKey, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SecretStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: TokenKey) -> Result<Option<String>, VaultError> {
        Ok(self.entries().get(&key).cloned())
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), VaultError> {
        self.entries().insert(key, value.to_string());
        Ok(())
    }

    fn delete(&self, key: TokenKey) -> Result<(), VaultError> {
        self.entries().remove(&key);
        Ok(())
    }
}
