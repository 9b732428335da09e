//! Authenticated HTTP transport for the distribution endpoints.
//!
//! Both endpoints authenticate with the license key in the query string
//! next to a fixed edition identifier. Transparent response decompression
//! is not enabled: the archive must arrive exactly as published so its
//! digest can be compared with the checksum endpoint.

use crate::config::DatabaseConfig;
use crate::error::RefreshError;
use reqwest::header::{ACCEPT_ENCODING, CONNECTION};
use reqwest::{Client, Response, StatusCode};
use std::future::Future;
use std::time::Duration;
use url::Url;

const EDITION_PARAM: &str = "edition_id";
const LICENSE_PARAM: &str = "license_key";

/// HTTP client bound to one license key and edition.
#[derive(Debug, Clone)]
pub struct DistributionClient {
    client: Client,
    license_key: String,
    edition_id: String,
}

impl DistributionClient {
    /// Build a client for the credentials in `config`.
    ///
    /// Fails with [`RefreshError::CredentialMissing`] when no key is configured.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, RefreshError> {
        let license_key = config
            .license_key
            .clone()
            .ok_or(RefreshError::CredentialMissing)?;

        // reqwest is built without a bundled provider
        let _ = rustls::crypto::ring::default_provider().install_default();

        let client = Client::builder()
            .connect_timeout(config.request_timeout.min(Duration::from_secs(10)))
            .pool_max_idle_per_host(0)
            .user_agent(concat!("geoloc-db/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            license_key,
            edition_id: config.edition_id.clone(),
        })
    }

    /// Append the credential parameters to `raw`, replacing any present.
    pub fn authenticated_url(&self, raw: &str) -> Result<Url, RefreshError> {
        let mut url = Url::parse(raw).map_err(|e| RefreshError::InvalidUrl {
            url: redact_url(raw),
            reason: e.to_string(),
        })?;

        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != EDITION_PARAM && key != LICENSE_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair(EDITION_PARAM, &self.edition_id)
            .append_pair(LICENSE_PARAM, &self.license_key);

        Ok(url)
    }

    /// Issue an authenticated GET and check the status.
    ///
    /// 401 maps to [`RefreshError::CredentialInvalid`]; any other non-2xx
    /// status maps to [`RefreshError::HttpStatus`].
    pub async fn get(&self, raw: &str) -> Result<Response, RefreshError> {
        let url = self.authenticated_url(raw)?;
        tracing::debug!(url = %redact_url(raw), "requesting distribution endpoint");

        let response = self
            .client
            .get(url)
            .header(ACCEPT_ENCODING, "identity")
            .header(CONNECTION, "close")
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(RefreshError::CredentialInvalid),
            status if status.is_success() => Ok(response),
            status => Err(RefreshError::HttpStatus {
                url: redact_url(raw),
                status,
            }),
        }
    }
}

/// `raw` without a `license_key` query parameter, safe to log or return.
///
/// An unparseable URL loses its whole query string.
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.split_once('?').map_or(raw, |(base, _)| base).to_string();
    };
    if !url.query_pairs().any(|(key, _)| key == LICENSE_PARAM) {
        return raw.to_string();
    }

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != LICENSE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if retained.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(retained);
    }
    url.into()
}

/// Run `operation` under `timeout`, mapping expiry to [`RefreshError::Timeout`].
///
/// Expiry drops the in-flight future, which aborts the request.
pub async fn with_deadline<T, F>(timeout: Duration, operation: F) -> Result<T, RefreshError>
where
    F: Future<Output = Result<T, RefreshError>>,
{
    tokio::time::timeout(timeout, operation)
        .await
        .map_err(|_| RefreshError::Timeout(timeout))?
}
