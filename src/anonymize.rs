//! Salted one-way hashing of author identifiers.
//!
//! The salt is process-wide configuration: load it once with [`Salt::from_env`] at startup,
//! then hand a shared [`Anonymizer`] to every reducer. Channel identifiers are never passed
//! through here; only the chatter's `authorChannelId` is protected.

use crate::error::ReduceError;
use sha1::{Digest, Sha1};
use std::fmt;

pub const SALT_ENV: &str = "ANONYMIZATION_SALT";

/// Anonymization secret. Never empty once constructed.
#[derive(Clone)]
pub struct Salt(String);

impl Salt {
    pub fn new(secret: impl Into<String>) -> Result<Self, ReduceError> {
        let s = secret.into();
        if s.is_empty() {
            return Err(ReduceError::MissingSalt);
        }
        Ok(Self(s))
    }

    pub fn from_env() -> Result<Self, ReduceError> {
        match std::env::var(SALT_ENV) {
            Ok(s) => Self::new(s),
            Err(_) => Err(ReduceError::MissingSalt),
        }
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(<redacted>)")
    }
}

#[derive(Clone, Debug)]
pub struct Anonymizer {
    salt: Salt,
}

impl Anonymizer {
    pub fn new(salt: Salt) -> Self {
        Self { salt }
    }

    /// Hex-encoded SHA-1 of `identifier ‖ salt`.
    pub fn anonymize(&self, identifier: &str) -> String {
        let mut h = Sha1::new();
        h.update(identifier.as_bytes());
        h.update(self.salt.0.as_bytes());
        hex::encode(h.finalize())
    }
}
