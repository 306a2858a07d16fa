// Accessory API HTTP client
//
// Wraps `reqwest::Client` with the two operations the insecure-mode wire
// protocol supports: read the full accessory graph and write a batch of
// characteristic values. Status-code semantics live here; retry policy
// belongs to callers.

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;
use crate::types::{
    AccessoryGraph, CharacteristicWrite, STATUS_SUCCESS, WriteRequest, WriteResponse,
};

/// Media type the bridge serves the accessory database in.
const HAP_MEDIA_TYPE: &str = "application/hap+json";

/// Raw HTTP client for one bridge endpoint.
///
/// Insecure-mode convention: the bridge PIN is sent verbatim as the
/// `Authorization` header value on writes — no signature, no session.
pub struct HapClient {
    http: reqwest::Client,
    base_url: Url,
    pin: SecretString,
}

impl HapClient {
    /// Create a new client for the given bridge base URL
    /// (e.g. `http://127.0.0.1:51826`).
    pub fn new(base_url: Url, pin: SecretString, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            pin,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, pin: SecretString) -> Self {
        Self {
            http,
            base_url,
            pin,
        }
    }

    /// The bridge base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a full URL for a protocol path.
    fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Fetch the full accessory/service/characteristic graph.
    ///
    /// Non-2xx responses and 2xx bodies that are not an object with an
    /// array-typed `accessories` field are both errors.
    pub async fn fetch_accessories(&self) -> Result<AccessoryGraph, Error> {
        let url = self.api_url("accessories")?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .header(ACCEPT, HAP_MEDIA_TYPE)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::MalformedResponse {
            message: e.to_string(),
            body: preview(&body),
        })
    }

    /// Write a batch of characteristic values.
    ///
    /// Response semantics: 204 = all writes succeeded; 207 = multi-status,
    /// succeeds only if every per-write status is zero, otherwise fails
    /// carrying the failing entries; any other status is a hard failure.
    pub async fn write_characteristics(
        &self,
        writes: &[CharacteristicWrite],
    ) -> Result<(), Error> {
        let url = self.api_url("characteristics")?;
        debug!("PUT {} ({} writes)", url, writes.len());

        let resp = self
            .http
            .put(url)
            .header(AUTHORIZATION, self.pin.expose_secret())
            .json(&WriteRequest {
                characteristics: writes,
            })
            .send()
            .await?;

        let status = resp.status();
        match status {
            StatusCode::NO_CONTENT => Ok(()),
            StatusCode::MULTI_STATUS => {
                let body = resp.text().await?;
                let parsed: WriteResponse =
                    serde_json::from_str(&body).map_err(|e| Error::MalformedResponse {
                        message: e.to_string(),
                        body: preview(&body),
                    })?;

                let failures: Vec<_> = parsed
                    .characteristics
                    .into_iter()
                    .filter(|s| s.status != STATUS_SUCCESS)
                    .collect();

                if failures.is_empty() {
                    Ok(())
                } else {
                    Err(Error::WriteFailed {
                        failures,
                        total: writes.len(),
                    })
                }
            }
            _ => {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::Http {
                    status: status.as_u16(),
                    body: preview(&body),
                })
            }
        }
    }
}

/// Truncate a response body for error reporting.
fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
