//! Request Handler
//!
//! Turns one HTTP call into at most one storage transaction.
//!
//! ## Order of checks
//! 1. Credential (nothing else happens for an unauthorized call)
//! 2. Key (an empty key never reaches storage)
//! 3. Body, for writes (read in full, bounded, before the transaction)
//! 4. Storage transaction

use std::sync::Arc;

use axum::body::Body;
use axum::http::StatusCode;
use thiserror::Error;

use crate::auth::AccessControl;
use crate::error::KvError;
use crate::store::Store;

/// Default request body limit (16 MB)
pub const DEFAULT_MAX_VALUE_SIZE: usize = 16 * 1024 * 1024;

/// Outcome of a failed call
///
/// Kept distinct internally and collapsed to a status code only at the
/// protocol boundary.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("key not found")]
    NotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage failure: {0}")]
    Storage(KvError),
}

impl RequestError {
    /// Status code reported to the caller
    ///
    /// Only the credential check has its own status; every other failure is
    /// reported as a miss.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::Unauthorized => StatusCode::UNAUTHORIZED,
            RequestError::NotFound
            | RequestError::InvalidInput(_)
            | RequestError::Storage(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl From<KvError> for RequestError {
    fn from(err: KvError) -> Self {
        match err {
            KvError::InvalidKey(reason) => RequestError::InvalidInput(reason),
            KvError::ValueTooLarge { .. } => RequestError::InvalidInput(err.to_string()),
            other => RequestError::Storage(other),
        }
    }
}

/// Validates, authorizes and executes get/set calls
pub struct RequestHandler {
    store: Arc<dyn Store>,
    access: AccessControl,
    max_value_size: usize,
}

impl RequestHandler {
    pub fn new(store: Arc<dyn Store>, access: AccessControl) -> Self {
        Self {
            store,
            access,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
        }
    }

    /// Set the largest body `set` will accept
    pub fn with_max_value_size(mut self, size: usize) -> Self {
        self.max_value_size = size;
        self
    }

    /// Read path: the stored value, or why there is none
    ///
    /// Credential and key are raw bytes, as decoded from the request path.
    pub async fn get(
        &self,
        credential: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
    ) -> Result<Vec<u8>, RequestError> {
        self.access.check(credential)?;
        let key = key.as_ref();
        if key.is_empty() {
            return Err(RequestError::InvalidInput("key is empty".to_string()));
        }

        let store = Arc::clone(&self.store);
        let key = key.to_vec();
        let found = tokio::task::spawn_blocking(move || store.read(&key))
            .await
            .map_err(|e| RequestError::Storage(KvError::Task(e.to_string())))??;

        found.ok_or(RequestError::NotFound)
    }

    /// Write path: store `body` at `key`
    ///
    /// The body is read only after the credential and key have passed.
    pub async fn set(
        &self,
        credential: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
        body: Body,
    ) -> Result<(), RequestError> {
        self.access.check(credential)?;
        let key = key.as_ref();
        if key.is_empty() {
            return Err(RequestError::InvalidInput("key is empty".to_string()));
        }

        let value = axum::body::to_bytes(body, self.max_value_size)
            .await
            .map_err(|e| RequestError::InvalidInput(format!("unreadable body: {}", e)))?;

        let store = Arc::clone(&self.store);
        let key = key.to_vec();
        let value_len = value.len();
        tokio::task::spawn_blocking(move || store.write(&key, &value))
            .await
            .map_err(|e| RequestError::Storage(KvError::Task(e.to_string())))??;

        tracing::debug!(value_len, "Value stored");
        Ok(())
    }
}
