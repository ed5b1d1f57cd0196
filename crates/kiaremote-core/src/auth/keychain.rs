use keyring::Entry;

use crate::error::{Error, Result};

const SERVICE_NAME: &str = "kiaremote";

/// Keychain account under which the store encryption secret lives
const STORE_KEY_ACCOUNT: &str = "session-store-key";

/// OS keychain access for the session store's encryption secret.
pub struct Keychain;

impl Keychain {
    fn entry() -> Result<Entry> {
        Entry::new(SERVICE_NAME, STORE_KEY_ACCOUNT)
            .map_err(|e| Error::Config(format!("Failed to create keyring entry: {}", e)))
    }

    /// Store the encryption secret in the OS keychain
    pub fn store_secret(secret: &str) -> Result<()> {
        Self::entry()?
            .set_password(secret)
            .map_err(|e| Error::Config(format!("Failed to store secret in keychain: {}", e)))
    }

    /// Retrieve the encryption secret, `None` if no entry exists
    pub fn secret() -> Result<Option<String>> {
        match Self::entry()?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Config(format!(
                "Failed to retrieve secret from keychain: {}",
                e
            ))),
        }
    }

    /// Delete the stored secret
    pub fn delete_secret() -> Result<()> {
        Self::entry()?
            .delete_credential()
            .map_err(|e| Error::Config(format!("Failed to delete secret from keychain: {}", e)))
    }
}
