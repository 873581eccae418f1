//! OS keychain storage for IdP passwords

use keyring::Entry;

use crate::constants::KEYRING_SERVICE;
use crate::error::SecretError;

/// Secret storage keyed by an opaque account key
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError>;

    fn set(&self, key: &str, secret: &str) -> Result<(), SecretError>;
}

/// Secret store using the OS keyring
///
/// - macOS: Keychain
/// - Linux: Secret Service (GNOME Keyring, KWallet)
/// - Windows: Credential Manager
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl KeyringSecretStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, SecretError> {
        Entry::new(&self.service, key)
            .map_err(|e| SecretError(format!("Failed to access keyring: {e}")))
    }
}

impl SecretStore for KeyringSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        match self.entry(key)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SecretError(format!("Failed to load password: {e}"))),
        }
    }

    fn set(&self, key: &str, secret: &str) -> Result<(), SecretError> {
        self.entry(key)?
            .set_password(secret)
            .map_err(|e| SecretError(format!("Failed to store password: {e}")))
    }
}

/// Keychain account key for a provider login
pub fn secret_key(provider: &str, username: &str) -> String {
    format!("{provider}:{username}")
}
