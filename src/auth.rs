//! Access Control
//!
//! Every call carries a credential that must match the process-wide secret
//! byte for byte before any storage work happens.

use std::fmt;
use std::sync::Arc;

use crate::handler::RequestError;

/// The shared secret, loaded once at startup
///
/// `Debug` never prints the secret itself.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    pub fn new(secret: impl AsRef<str>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<&str> for Credential {
    fn from(secret: &str) -> Self {
        Self::new(secret)
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Self::new(secret)
    }
}

/// Authorizes calls against the configured credential
#[derive(Debug, Clone)]
pub struct AccessControl {
    credential: Credential,
}

impl AccessControl {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }

    /// True iff `supplied` equals the configured credential exactly
    ///
    /// The comparison is on raw bytes; a supplied credential need not be
    /// valid UTF-8.
    pub fn authorize(&self, supplied: impl AsRef<[u8]>) -> bool {
        constant_time_eq(self.credential.as_bytes(), supplied.as_ref())
    }

    /// Like `authorize`, but as a request outcome
    pub fn check(&self, supplied: impl AsRef<[u8]>) -> Result<(), RequestError> {
        if self.authorize(supplied) {
            Ok(())
        } else {
            tracing::warn!("Auth failed");
            Err(RequestError::Unauthorized)
        }
    }
}

/// Compare without short-circuiting on the first differing byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
