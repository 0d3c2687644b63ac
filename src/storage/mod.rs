//! Credential storage.
//!
//! AI provider API keys live in the OS keychain; the engine reads them
//! through [`CredentialStore`] so tests can substitute [`StaticCredentials`].
//! Keychain calls block and run on `tokio::task::spawn_blocking`.

mod keychain;

pub use keychain::{
    CredentialStore, KeychainAccess, KeychainError, Result, StaticCredentials,
};

#[cfg(test)]
pub use keychain::MockCredentialStore;
