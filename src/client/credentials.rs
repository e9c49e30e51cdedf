//! Bearer credentials for the completion service
//!
//! Sign-in itself happens elsewhere; this module only hands the access token
//! to outgoing requests. Tokens come from the environment or the OS keyring.

use crate::error::Result;

/// Keyring service name used for stored access tokens
pub const KEYRING_SERVICE: &str = "chatdeck";

/// Keyring user under which the access token is stored
pub const KEYRING_USER: &str = "access_token";

/// Environment variable that overrides the stored access token
pub const ACCESS_TOKEN_ENV: &str = "CHATDECK_ACCESS_TOKEN";

/// Supplies the bearer token for each request
pub trait CredentialSource: Send + Sync {
    /// The current token, if one is available
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token (or none)
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(pub Option<String>);

impl StaticCredential {
    /// Wrap a known token
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }
}

impl CredentialSource for StaticCredential {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Token stored in the OS keyring
#[derive(Debug, Clone)]
pub struct KeyringCredential {
    service: String,
    user: String,
}

impl Default for KeyringCredential {
    fn default() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
            user: KEYRING_USER.to_string(),
        }
    }
}

impl KeyringCredential {
    /// Store a token, replacing any previous one
    pub fn store(&self, token: &str) -> Result<()> {
        let entry = keyring::Entry::new(&self.service, &self.user)?;
        entry.set_password(token)?;
        tracing::info!("Stored access token in keyring");
        Ok(())
    }

    /// Remove the stored token; succeeds if none was stored
    pub fn clear(&self) -> Result<()> {
        let entry = keyring::Entry::new(&self.service, &self.user)?;
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CredentialSource for KeyringCredential {
    fn bearer_token(&self) -> Option<String> {
        let entry = match keyring::Entry::new(&self.service, &self.user) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Keyring unavailable: {}", e);
                return None;
            }
        };
        match entry.get_password() {
            Ok(token) => Some(token),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                tracing::warn!("Failed to read access token from keyring: {}", e);
                None
            }
        }
    }
}

/// Prefers `CHATDECK_ACCESS_TOKEN`, falling back to the keyring
#[derive(Debug, Clone, Default)]
pub struct EnvOrKeyringCredential {
    keyring: KeyringCredential,
}

impl CredentialSource for EnvOrKeyringCredential {
    fn bearer_token(&self) -> Option<String> {
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
            _ => self.keyring.bearer_token(),
        }
    }
}
