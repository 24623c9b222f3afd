//! Session credentials — an opaque blob owned by a storage backend.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use bytes::Bytes;

use crate::error::BuildError;

/// Version marker at the front of a string session.
const STRING_SESSION_VERSION: char = '1';

/// Credential blob. Never interpreted by the pipeline.
#[derive(Clone, PartialEq, Eq)]
pub struct Session(Bytes);

impl Session {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode a portable string session: version `1` followed by URL-safe
    /// base64 (padding optional).
    pub fn from_string_session(encoded: &str) -> Result<Self, BuildError> {
        let encoded = encoded.trim();
        let body = encoded
            .strip_prefix(STRING_SESSION_VERSION)
            .ok_or_else(|| {
                BuildError::MalformedSession(format!(
                    "unsupported version prefix {:?}",
                    encoded.chars().next()
                ))
            })?;

        let data = if body.ends_with('=') {
            URL_SAFE.decode(body)
        } else {
            URL_SAFE_NO_PAD.decode(body)
        }
        .map_err(|e| BuildError::MalformedSession(e.to_string()))?;

        if data.is_empty() {
            return Err(BuildError::MalformedSession("empty session payload".into()));
        }
        Ok(Self(Bytes::from(data)))
    }

    pub fn to_string_session(&self) -> String {
        format!("{STRING_SESSION_VERSION}{}", URL_SAFE.encode(&self.0))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials stay out of logs.
        f.debug_struct("Session").field("len", &self.0.len()).finish()
    }
}
