//! Upload credentials.
//!
//! Wallet material is held in a [`SecretString`] and only exposed when the
//! storage client builds its request.

use secrecy::{ExposeSecret, SecretString};

/// Where and as whom uploads are made.
#[derive(Clone, Debug)]
pub struct UploadCredentials {
    /// Upload endpoint of the storage network
    pub endpoint: String,

    /// Wallet key or bearer token authorizing writes
    pub wallet: Option<SecretString>,
}

impl UploadCredentials {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            wallet: None,
        }
    }

    /// Attach wallet material (e.g. the contents of a keyfile). Surrounding
    /// whitespace is dropped; a blank keyfile leaves uploads anonymous.
    pub fn with_wallet(mut self, wallet: impl Into<String>) -> Self {
        let wallet = wallet.into();
        let trimmed = wallet.trim();
        self.wallet = (!trimmed.is_empty()).then(|| SecretString::from(trimmed));
        self
    }

    /// Wallet material for the `Authorization` header.
    pub fn bearer(&self) -> Option<&str> {
        self.wallet.as_ref().map(|w| w.expose_secret())
    }
}
