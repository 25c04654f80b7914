//! Glacier REST API client.
//!
//! Async HTTP client using `reqwest`; every request is signed with AWS
//! Signature Version 4.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use frostbox_transfer::{ByteRange, TransferResult};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use tracing::debug;

use crate::credentials::Credentials;
use crate::error::Error;
use crate::signer::{self, CanonicalRequest, amz_date, sha256_hex};
use crate::types::{ApiErrorBody, ListVaultsPage, VaultDescription};

const API_VERSION: &str = "2012-06-01";
const SERVICE: &str = "glacier";

/// Longest archive description the service accepts.
const MAX_DESCRIPTION_LEN: usize = 1024;

/// Everything but RFC 3986 unreserved characters is escaped.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Glacier API client bound to one account.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    host: String,
    credentials: Credentials,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("region", &self.credentials.region)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client for the regional endpoint of `credentials.region`.
    pub fn new(credentials: Credentials) -> Result<Self, Error> {
        let endpoint = format!("https://glacier.{}.amazonaws.com", credentials.region);
        Self::with_endpoint(credentials, &endpoint)
    }

    /// Creates a client for a custom endpoint (`scheme://host[:port]`).
    pub fn with_endpoint(credentials: Credentials, endpoint: &str) -> Result<Self, Error> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|_| Error::InvalidEndpoint(endpoint.to_string()))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(Error::InvalidEndpoint(endpoint.to_string())),
        };

        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            base_url: format!("{}://{host}", url.scheme()),
            host,
            credentials,
        })
    }

    pub fn region(&self) -> &str {
        &self.credentials.region
    }

    /// Starts a multipart upload and returns its upload id.
    pub async fn initiate_multipart_upload(
        &self,
        vault: &str,
        description: &str,
        part_size: u64,
    ) -> Result<String, Error> {
        let resp = self
            .send(
                Method::POST,
                &format!("{}/multipart-uploads", self.vault_path(vault)),
                &[],
                vec![
                    ("x-amz-archive-description", sanitize_description(description)),
                    ("x-amz-part-size", part_size.to_string()),
                ],
                Vec::new(),
            )
            .await?;
        header(&resp, "x-amz-multipart-upload-id")
    }

    /// Uploads one part of a multipart upload.
    pub async fn upload_multipart_part(
        &self,
        vault: &str,
        upload_id: &str,
        range: ByteRange,
        checksum: &str,
        body: Vec<u8>,
    ) -> Result<(), Error> {
        self.send(
            Method::PUT,
            &self.upload_path(vault, upload_id),
            &[],
            vec![
                ("content-range", range.content_range()),
                ("x-amz-sha256-tree-hash", checksum.to_string()),
            ],
            body,
        )
        .await?;
        Ok(())
    }

    /// Completes a multipart upload.
    pub async fn complete_multipart_upload(
        &self,
        vault: &str,
        upload_id: &str,
        archive_size: u64,
        checksum: &str,
    ) -> Result<TransferResult, Error> {
        let resp = self
            .send(
                Method::POST,
                &self.upload_path(vault, upload_id),
                &[],
                vec![
                    ("x-amz-archive-size", archive_size.to_string()),
                    ("x-amz-sha256-tree-hash", checksum.to_string()),
                ],
                Vec::new(),
            )
            .await?;
        archive_result(&resp)
    }

    /// Aborts a multipart upload.
    pub async fn abort_multipart_upload(&self, vault: &str, upload_id: &str) -> Result<(), Error> {
        self.send(
            Method::DELETE,
            &self.upload_path(vault, upload_id),
            &[],
            Vec::new(),
            Vec::new(),
        )
        .await?;
        Ok(())
    }

    /// Uploads an archive in a single request.
    pub async fn upload_archive(
        &self,
        vault: &str,
        description: &str,
        checksum: &str,
        body: Vec<u8>,
    ) -> Result<TransferResult, Error> {
        let resp = self
            .send(
                Method::POST,
                &format!("{}/archives", self.vault_path(vault)),
                &[],
                vec![
                    ("x-amz-archive-description", sanitize_description(description)),
                    ("x-amz-sha256-tree-hash", checksum.to_string()),
                ],
                body,
            )
            .await?;
        archive_result(&resp)
    }

    /// Deletes an archive.
    pub async fn delete_archive(&self, vault: &str, archive_id: &str) -> Result<(), Error> {
        let path = format!("{}/archives/{}", self.vault_path(vault), encode(archive_id));
        self.send(Method::DELETE, &path, &[], Vec::new(), Vec::new())
            .await?;
        Ok(())
    }

    /// Creates a vault. Creating an existing vault succeeds.
    pub async fn create_vault(&self, vault: &str) -> Result<(), Error> {
        self.send(Method::PUT, &self.vault_path(vault), &[], Vec::new(), Vec::new())
            .await?;
        Ok(())
    }

    /// Deletes an empty vault.
    pub async fn delete_vault(&self, vault: &str) -> Result<(), Error> {
        self.send(
            Method::DELETE,
            &self.vault_path(vault),
            &[],
            Vec::new(),
            Vec::new(),
        )
        .await?;
        Ok(())
    }

    /// Lists every vault of the account, following pagination markers.
    pub async fn list_vaults(&self) -> Result<Vec<VaultDescription>, Error> {
        let path = format!("/{}/vaults", encode(&self.credentials.account_id));
        let mut vaults = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let query: Vec<(&str, &str)> = match &marker {
                Some(m) => vec![("marker", m.as_str())],
                None => Vec::new(),
            };
            let resp = self
                .send(Method::GET, &path, &query, Vec::new(), Vec::new())
                .await?;
            let body = resp.bytes().await?;
            let page: ListVaultsPage = serde_json::from_slice(&body)?;
            vaults.extend(page.vault_list);

            match page.marker {
                Some(m) if !m.is_empty() => marker = Some(m),
                _ => break,
            }
        }

        Ok(vaults)
    }

    fn vault_path(&self, vault: &str) -> String {
        format!(
            "/{}/vaults/{}",
            encode(&self.credentials.account_id),
            encode(vault)
        )
    }

    fn upload_path(&self, vault: &str, upload_id: &str) -> String {
        format!(
            "{}/multipart-uploads/{}",
            self.vault_path(vault),
            encode(upload_id)
        )
    }

    /// Signs and sends a request; non-2xx responses become [`Error::Api`].
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        extra_headers: Vec<(&'static str, String)>,
        body: Vec<u8>,
    ) -> Result<reqwest::Response, Error> {
        let query = canonical_query(query);
        let now = Utc::now();
        let payload_hash = sha256_hex(&body);

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), self.host.clone());
        headers.insert("x-amz-date".to_string(), amz_date(&now));
        headers.insert("x-amz-glacier-version".to_string(), API_VERSION.to_string());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        for (name, value) in extra_headers {
            headers.insert(name.to_string(), value);
        }

        let authorization = signer::authorization(
            &self.credentials,
            SERVICE,
            &CanonicalRequest {
                method: method.as_str(),
                path,
                query: &query,
                headers: &headers,
                payload_hash: &payload_hash,
            },
            &now,
        )?;

        let mut url = format!("{}{path}", self.base_url);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        debug!(method = %method, path, len = body.len(), "glacier request");

        let mut req = self
            .http
            .request(method, &url)
            .header(AUTHORIZATION, authorization);
        for (name, value) in &headers {
            // reqwest derives Host from the URL.
            if name != "host" {
                req = req.header(name.as_str(), value.as_str());
            }
        }

        let resp = req.body(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &text));
        }
        Ok(resp)
    }
}

fn encode(segment: &str) -> String {
    utf8_percent_encode(segment, UNRESERVED).to_string()
}

/// Sorted, encoded query string.
fn canonical_query(params: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Descriptions must be printable ASCII of bounded length.
fn sanitize_description(description: &str) -> String {
    description
        .chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .take(MAX_DESCRIPTION_LEN)
        .collect()
}

fn header(resp: &reqwest::Response, name: &'static str) -> Result<String, Error> {
    resp.headers()
        .get(name)
        .ok_or(Error::MissingHeader(name))?
        .to_str()
        .map(str::to_string)
        .map_err(|_| Error::InvalidHeader(name))
}

fn archive_result(resp: &reqwest::Response) -> Result<TransferResult, Error> {
    Ok(TransferResult::new(
        header(resp, "location")?,
        header(resp, "x-amz-archive-id")?,
        header(resp, "x-amz-sha256-tree-hash")?,
    ))
}

fn api_error(status: u16, body: &str) -> Error {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) if !parsed.code.is_empty() => Error::Api {
            status,
            code: parsed.code,
            message: parsed.message,
        },
        _ => Error::Api {
            status,
            code: "Unknown".into(),
            message: body.trim().to_string(),
        },
    }
}
