//! Keychain access for AI provider credentials.
//!
//! Wraps the keyring crate to provide OS-native credential storage.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur during keychain operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Credential not found: {0}")]
    NotFound(String),

    #[error("Failed to spawn blocking task: {0}")]
    TaskFailed(String),
}

/// Result type for keychain operations.
pub type Result<T> = std::result::Result<T, KeychainError>;

/// Read access to stored secrets, keyed by keychain id.
///
/// The engine only needs to know whether a provider has a key and what it is;
/// writing keys is the settings UI's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the secret for `key`, or `None` if nothing is stored.
    async fn retrieve(&self, key: &str) -> Result<Option<String>>;

    async fn has_credential(&self, key: &str) -> Result<bool> {
        Ok(self.retrieve(key).await?.is_some())
    }
}

/// Provides access to the OS keychain for credential storage.
///
/// Credentials are stored using the service name as a namespace.
#[derive(Debug, Clone)]
pub struct KeychainAccess {
    service_name: String,
}

impl KeychainAccess {
    pub const DEFAULT_SERVICE: &'static str = "io.mailwatch.app";

    pub fn new() -> Self {
        Self {
            service_name: Self::DEFAULT_SERVICE.to_string(),
        }
    }

    /// Creates a new KeychainAccess with a custom service name.
    ///
    /// Useful for testing to avoid interfering with real credentials.
    pub fn with_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Stores a credential, overwriting any existing value for `key`.
    pub async fn store(&self, key: &str, value: &str) -> Result<()> {
        let service = self.service_name.clone();
        let key = key.to_string();
        let value = value.to_string();

        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &key)?;
            entry.set_password(&value)?;
            Ok(())
        })
        .await
        .map_err(|e| KeychainError::TaskFailed(e.to_string()))?
    }

    /// Deletes a credential. Fails with [`KeychainError::NotFound`] if absent.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let service = self.service_name.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &key)?;
            match entry.delete_credential() {
                Ok(()) => Ok(()),
                Err(keyring::Error::NoEntry) => Err(KeychainError::NotFound(key)),
                Err(e) => Err(KeychainError::Keyring(e)),
            }
        })
        .await
        .map_err(|e| KeychainError::TaskFailed(e.to_string()))?
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Keychain id for an AI provider's API key.
    pub fn ai_api_key(provider: &str) -> String {
        format!("ai.api_key.{}", provider)
    }
}

impl Default for KeychainAccess {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for KeychainAccess {
    async fn retrieve(&self, key: &str) -> Result<Option<String>> {
        let service = self.service_name.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &key)?;
            match entry.get_password() {
                Ok(password) => Ok(Some(password)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(KeychainError::Keyring(e)),
            }
        })
        .await
        .map_err(|e| KeychainError::TaskFailed(e.to_string()))?
    }
}

/// Credentials held in memory, for tests and headless setups.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    secrets: RwLock<HashMap<String, String>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.get_mut().insert(key.into(), value.into());
        self
    }

    pub async fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.secrets.write().await.insert(key.into(), value.into());
    }
}

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn retrieve(&self, key: &str) -> Result<Option<String>> {
        Ok(self.secrets.read().await.get(key).cloned())
    }
}
