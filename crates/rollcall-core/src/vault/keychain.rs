use keyring::Entry;

use super::{SecretStore, TokenKey, VaultError};

const SERVICE_NAME: &str = "rollcall";

/// Token storage in the OS keychain (Keychain, Credential Manager, kernel keyring).
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    /// Open the default store, failing if the platform keychain cannot be reached.
    /// A missing entry counts as reachable.
    pub fn probe() -> Result<Self, VaultError> {
        let store = Self::new();
        match store.entry(TokenKey::Access)?.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(store),
            Err(e) => Err(e.into()),
        }
    }

    fn entry(&self, key: TokenKey) -> Result<Entry, VaultError> {
        Ok(Entry::new(&self.service, key.as_str())?)
    }
}

impl SecretStore for KeyringStore {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn get(&self, key: TokenKey) -> Result<Option<String>, VaultError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), VaultError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn delete(&self, key: TokenKey) -> Result<(), VaultError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
