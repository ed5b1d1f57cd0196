use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

/// Username/password pair for the owners portal.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The cache key for this credential pair
    pub fn identity(&self) -> UserIdentity {
        UserIdentity::derive(&self.username, &self.password)
    }
}

// Never print the password
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SHA-512 of a credential pair, hex encoded.
///
/// Each field is length-prefixed before hashing so that moving characters
/// between username and password changes the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(String);

impl UserIdentity {
    pub fn derive(username: &str, password: &str) -> Self {
        let mut hasher = Sha512::new();
        for field in [username, password] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for logs and listings
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
