//! Presigned object-store URLs.
//!
//! `S3Presigner` produces AWS Signature V4 query-string URLs, so the caller
//! can talk to the bucket directly for a short window without holding any
//! credentials of its own.

use crate::models::request_path::Operation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::{fmt::Write, time::Duration};
use thiserror::Error;
use url::{Host, Url};

/// Lifetime of every issued URL.
pub const PRESIGN_EXPIRY: Duration = Duration::from_secs(10 * 60);

const SERVICE: &str = "s3";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Issues a time-bounded URL for one operation on one object.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign(
        &self,
        operation: Operation,
        resource_key: &str,
        bucket: &str,
    ) -> Result<String, SignError>;
}

/// Static access key used to sign URLs.
#[derive(Clone)]
pub struct SigningCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// SigV4 presigner for S3-compatible endpoints.
#[derive(Debug, Clone)]
pub struct S3Presigner {
    endpoint: Url,
    region: String,
    credentials: SigningCredentials,
    path_style: bool,
}

impl S3Presigner {
    pub fn new(
        endpoint: &str,
        region: impl Into<String>,
        credentials: SigningCredentials,
    ) -> Result<Self, SignError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SignError::SigningFailed(format!("invalid endpoint: {}", e)))?;
        let path_style = is_path_style_default(&endpoint);
        Ok(Self {
            endpoint,
            region: region.into(),
            credentials,
            path_style,
        })
    }

    /// Build the object URL and its canonical path.
    ///
    /// Every key segment is escaped here, `%` included, so the path S3
    /// decodes is exactly `key`. `Url` never sees a raw segment.
    fn object_url(&self, bucket: &str, key: &str) -> Result<(Url, String), SignError> {
        let mut segments = Vec::new();
        for segment in key.trim_start_matches('/').split('/') {
            if segment == "." || segment == ".." {
                return Err(SignError::SigningFailed(format!(
                    "dot segment in object key {}",
                    key
                )));
            }
            segments.push(percent_encode(segment));
        }
        let object_path = segments.join("/");

        let mut url = self.endpoint.clone();
        let path = if self.path_style {
            format!("/{}/{}", percent_encode(bucket), object_path)
        } else {
            let host = self
                .endpoint
                .host_str()
                .ok_or_else(|| SignError::SigningFailed("endpoint has no host".into()))?;
            url.set_host(Some(&format!("{}.{}", bucket, host)))
                .map_err(|e| SignError::SigningFailed(format!("invalid host: {}", e)))?;
            format!("/{}", object_path)
        };
        url.set_path(&path);
        if url.path() != path {
            return Err(SignError::SigningFailed(format!(
                "object path rewritten from {} to {}",
                path,
                url.path()
            )));
        }
        Ok((url, path))
    }

    /// Presign `method` on `bucket`/`key` as of `time`.
    pub fn presign_at(
        &self,
        method: &str,
        bucket: &str,
        key: &str,
        time: DateTime<Utc>,
    ) -> Result<Url, SignError> {
        if bucket.is_empty() {
            return Err(SignError::SigningFailed("bucket name is empty".into()));
        }

        let timestamp = time.format("%Y%m%dT%H%M%SZ").to_string();
        let date = &timestamp[0..8];
        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE);

        let (mut url, canonical_path) = self.object_url(bucket, key)?;
        let host = extract_host(&url)?;

        let mut query_params: Vec<(String, String)> = vec![
            ("X-Amz-Algorithm".into(), ALGORITHM.into()),
            ("X-Amz-Content-Sha256".into(), UNSIGNED_PAYLOAD.into()),
            (
                "X-Amz-Credential".into(),
                format!("{}/{}", self.credentials.access_key_id, scope),
            ),
            ("X-Amz-Date".into(), timestamp.clone()),
            (
                "X-Amz-Expires".into(),
                PRESIGN_EXPIRY.as_secs().to_string(),
            ),
            ("X-Amz-SignedHeaders".into(), "host".into()),
        ];
        if let Some(token) = &self.credentials.session_token {
            query_params.push(("X-Amz-Security-Token".into(), token.clone()));
        }
        query_params.sort_by(|a, b| a.0.cmp(&b.0));

        let canonical_query = query_params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "{}\n{}\n{}\nhost:{}\n\nhost\n{}",
            method,
            canonical_path,
            canonical_query,
            host,
            UNSIGNED_PAYLOAD
        );

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            timestamp,
            scope,
            hex_encode(&Sha256::digest(canonical_request.as_bytes()))
        );

        let key = SigningKey::derive(&self.credentials.secret_access_key, date, &self.region)?;
        let signature = key.sign(string_to_sign.as_bytes());

        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            for (k, v) in &query_params {
                query.append_pair(k, v);
            }
            query.append_pair("X-Amz-Signature", &signature);
        }
        Ok(url)
    }
}

#[async_trait]
impl UrlSigner for S3Presigner {
    async fn sign(
        &self,
        operation: Operation,
        resource_key: &str,
        bucket: &str,
    ) -> Result<String, SignError> {
        let url = self.presign_at(operation.http_method(), bucket, resource_key, Utc::now())?;
        Ok(url.to_string())
    }
}

/// IP addresses and localhost cannot resolve `{bucket}.{host}`.
fn is_path_style_default(endpoint: &Url) -> bool {
    match endpoint.host() {
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
        Some(Host::Domain(domain)) => domain == "localhost",
        None => false,
    }
}

fn extract_host(url: &Url) -> Result<String, SignError> {
    let hostname = url
        .host_str()
        .ok_or_else(|| SignError::SigningFailed("URL missing host".into()))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", hostname, port),
        None => hostname.to_string(),
    })
}

struct SigningKey(Vec<u8>);

impl SigningKey {
    fn derive(secret_key: &str, date: &str, region: &str) -> Result<Self, SignError> {
        let date_key = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes())?;
        let region_key = hmac_sha256(&date_key, region.as_bytes())?;
        let service_key = hmac_sha256(&region_key, SERVICE.as_bytes())?;
        Ok(Self(hmac_sha256(&service_key, b"aws4_request")?))
    }

    fn sign(&self, message: &[u8]) -> String {
        // Key derivation already proved this key is accepted.
        hmac_sha256(&self.0, message)
            .map(|bytes| hex_encode(&bytes))
            .unwrap_or_default()
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SignError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| SignError::SigningFailed(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(result, "{:02x}", byte);
    }
    result
}

/// RFC 3986 unreserved characters pass through, everything else is escaped.
fn percent_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                let _ = write!(result, "%{:02X}", byte);
            }
        }
    }
    result
}
