use std::net::IpAddr;
use std::time::Duration;

use reqwest::{Client, header::ACCEPT};
use tonic::async_trait;
use tracing::debug;
use url::{Host, Url};

use crate::error::FetchError;
use crate::models::KeySet;

/// Apple's public key endpoint.
pub const APPLE_KEYS_ENDPOINT: &str = "https://appleid.apple.com/auth/keys";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the key set identity tokens are verified against.
///
/// Every verification fetches the current key set; implementations decide
/// whether and how long to cache it.
#[cfg_attr(test, mock::async_client)]
#[async_trait]
pub trait KeySetFetcher: Send + Sync + 'static {
    /// Fetches the current key set.
    async fn fetch_key_set(&self) -> Result<KeySet, FetchError>;
}

/// Fetches the key set over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpKeySetFetcher {
    client: Client,
    endpoint: Url,
}

impl HttpKeySetFetcher {
    /// Creates a fetcher for Apple's key endpoint.
    ///
    /// # Errors
    /// - the http client cannot be built
    pub fn new() -> Result<Self, FetchError> {
        Self::with_endpoint(APPLE_KEYS_ENDPOINT)
    }

    /// Creates a fetcher for a custom endpoint, e.g. a proxy.
    ///
    /// The endpoint must use https. Plain http is only accepted for
    /// loopback hosts, which local key servers in tests listen on.
    ///
    /// # Errors
    /// - the endpoint is not a valid URL
    /// - the endpoint is plain http on a non-loopback host
    /// - the http client cannot be built
    pub fn with_endpoint(endpoint: &str) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)?;
        if endpoint.scheme() != "https" && !is_loopback(&endpoint) {
            return Err(FetchError::InsecureEndpoint(endpoint));
        }
        let client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|_| FetchError::BuildHttpClient)?;

        Ok(Self { client, endpoint })
    }

    /// Replaces the http client, e.g. to change its timeout.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// The endpoint keys are fetched from.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn is_loopback(url: &Url) -> bool {
    if url.scheme() != "http" {
        return false;
    }
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    /// # Errors
    /// - request cannot be sent or times out
    /// - response status is not 2xx
    /// - body cannot be read or is not a key set
    async fn fetch_key_set(&self) -> Result<KeySet, FetchError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(FetchError::from_send)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatusCode(status));
        }

        let body = response.bytes().await.map_err(FetchError::ReadBody)?;
        let key_set: KeySet = serde_json::from_slice(&body)?;

        debug!(keys = key_set.keys.len(), endpoint = %self.endpoint, "fetched key set");
        Ok(key_set)
    }
}
