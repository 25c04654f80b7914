//! AWS Signature Version 4 request signing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::credentials::Credentials;
use crate::error::Error;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// The parts of an HTTP request covered by the signature.
pub(crate) struct CanonicalRequest<'a> {
    pub method: &'a str,
    /// URI-encoded absolute path.
    pub path: &'a str,
    /// Encoded, sorted query string (may be empty).
    pub query: &'a str,
    /// Lowercase header names to trimmed values.
    pub headers: &'a BTreeMap<String, String>,
    /// Hex SHA-256 of the body.
    pub payload_hash: &'a str,
}

impl CanonicalRequest<'_> {
    pub fn signed_headers(&self) -> String {
        self.headers
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn canonical_string(&self) -> String {
        let mut headers = String::new();
        for (name, value) in self.headers {
            headers.push_str(name);
            headers.push(':');
            headers.push_str(value.trim());
            headers.push('\n');
        }
        format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            self.path,
            self.query,
            headers,
            self.signed_headers(),
            self.payload_hash
        )
    }
}

/// `x-amz-date` format.
pub(crate) fn amz_date(now: &DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Hex SHA-256 of `data`.
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], Error> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| Error::InvalidKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// Derives the per-day signing key.
pub(crate) fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<[u8; 32], Error> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

/// Computes the `Authorization` header value for `req`.
///
/// `req.headers` must already contain `host` and `x-amz-date`.
pub(crate) fn authorization(
    credentials: &Credentials,
    service: &str,
    req: &CanonicalRequest<'_>,
    now: &DateTime<Utc>,
) -> Result<String, Error> {
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{}/{service}/aws4_request", credentials.region);
    let string_to_sign = format!(
        "{ALGORITHM}\n{}\n{scope}\n{}",
        amz_date(now),
        sha256_hex(req.canonical_string().as_bytes())
    );

    let key = signing_key(&credentials.secret_key, &date, &credentials.region, service)?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

    Ok(format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
        credentials.access_key,
        req.signed_headers()
    ))
}
