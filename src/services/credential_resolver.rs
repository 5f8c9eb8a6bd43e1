//! Maps a bearer credential to the user id it was issued for.
//!
//! Credentials are never stored. The gateway only keeps the SHA-256 hex
//! digest of each token in the identity map, and looks incoming tokens up by
//! their digest.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("user id hash map is empty")]
    NoIdentityMapConfigured,
    #[error("given auth token is invalid")]
    InvalidCredential,
    #[error("user id hash map is malformed: {0}")]
    MalformedIdentityMap(String),
}

/// Digest of a bearer credential to the user id it belongs to.
#[derive(Debug, Clone)]
pub struct IdentityMap {
    entries: HashMap<String, String>,
}

#[derive(Deserialize)]
struct IdentityMapDocument {
    #[serde(rename = "Maps")]
    maps: HashMap<String, String>,
}

impl IdentityMap {
    /// Parse `{"Maps": {"<sha256-hex>": "<user id>"}}`.
    pub fn from_json(source: &str) -> Result<Self, CredentialError> {
        if source.trim().is_empty() {
            return Err(CredentialError::NoIdentityMapConfigured);
        }
        let doc: IdentityMapDocument = serde_json::from_str(source)
            .map_err(|err| CredentialError::MalformedIdentityMap(err.to_string()))?;
        Ok(Self { entries: doc.maps })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn lookup(&self, digest: &str) -> Option<&str> {
        self.entries.get(digest).map(String::as_str)
    }
}

/// Resolves `Authorization` header values against a preloaded identity map.
///
/// The map source is parsed once. If parsing failed, the same error is
/// returned for every request so a broken deployment never authenticates
/// anyone.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    identities: Result<IdentityMap, CredentialError>,
}

impl CredentialResolver {
    pub fn from_source(source: &str) -> Self {
        Self {
            identities: IdentityMap::from_json(source),
        }
    }

    /// Number of known credentials, or the load error.
    pub fn identity_count(&self) -> Result<usize, &CredentialError> {
        self.identities.as_ref().map(IdentityMap::len)
    }

    pub fn resolve(&self, header_value: &str) -> Result<String, CredentialError> {
        let identities = self.identities.as_ref().map_err(Clone::clone)?;
        let digest = credential_digest(header_value);
        identities
            .lookup(&digest)
            .map(str::to_string)
            .ok_or(CredentialError::InvalidCredential)
    }
}

/// Hex SHA-256 of the header value with one `Bearer ` prefix removed.
///
/// A header without the prefix is hashed as-is.
pub fn credential_digest(header_value: &str) -> String {
    let token = header_value
        .strip_prefix(BEARER_PREFIX)
        .unwrap_or(header_value);
    format!("{:x}", Sha256::digest(token.as_bytes()))
}
