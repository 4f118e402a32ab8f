//! Daemon passwords in the OS keyring.
//!
//! Entries use the service name "pmpd" and the server address (`host:port`)
//! as the user key, so each daemon keeps its own password.

use thiserror::Error;

const SERVICE_NAME: &str = "pmpd";

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("no password stored for {key}")]
    NotFound { key: String },

    #[error("keyring access denied: {0}")]
    AccessDenied(String),

    #[error("keyring unavailable: {0}")]
    Unavailable(String),

    #[error("keyring error: {0}")]
    Other(String),
}

impl From<keyring::Error> for SecretsError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoEntry => SecretsError::NotFound {
                key: "unknown".into(),
            },
            keyring::Error::NoStorageAccess(e) => SecretsError::AccessDenied(e.to_string()),
            keyring::Error::PlatformFailure(e) => SecretsError::Unavailable(e.to_string()),
            other => SecretsError::Other(other.to_string()),
        }
    }
}

pub type SecretsResult<T> = Result<T, SecretsError>;

#[derive(Debug, Clone)]
pub struct CredentialStore {
    service: String,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.into(),
        }
    }

    fn build_key(host: &str, port: u16) -> String {
        format!("{}:{}", host.to_ascii_lowercase(), port)
    }

    pub fn store_password(&self, host: &str, port: u16, password: &str) -> SecretsResult<()> {
        let key = Self::build_key(host, port);
        let entry = keyring::Entry::new(&self.service, &key)?;
        entry.set_password(password)?;
        tracing::debug!(server = %key, "stored password in keyring");
        Ok(())
    }

    pub fn password(&self, host: &str, port: u16) -> SecretsResult<String> {
        let key = Self::build_key(host, port);
        let entry = keyring::Entry::new(&self.service, &key)?;
        match entry.get_password() {
            Ok(secret) => Ok(secret),
            Err(keyring::Error::NoEntry) => Err(SecretsError::NotFound { key }),
            Err(e) => Err(e.into()),
        }
    }

    /// `Ok(None)` when nothing is stored; other keyring failures are errors.
    pub fn find_password(&self, host: &str, port: u16) -> SecretsResult<Option<String>> {
        match self.password(host, port) {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretsError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Succeeds when nothing was stored.
    pub fn delete_password(&self, host: &str, port: u16) -> SecretsResult<()> {
        let key = Self::build_key(host, port);
        let entry = keyring::Entry::new(&self.service, &key)?;
        match entry.delete_credential() {
            Ok(()) => {
                tracing::debug!(server = %key, "deleted password from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The store itself needs a live keyring, which CI machines rarely have.

    #[test]
    fn key_is_normalised_address() {
        assert_eq!(CredentialStore::build_key("Music.LAN", 6600), "music.lan:6600");
        assert_eq!(CredentialStore::build_key("127.0.0.1", 6601), "127.0.0.1:6601");
    }

    #[test]
    fn not_found_message_names_server() {
        let err = SecretsError::NotFound {
            key: "music.lan:6600".into(),
        };
        assert_eq!(err.to_string(), "no password stored for music.lan:6600");
    }
}
