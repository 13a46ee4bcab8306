//! Main Cuckoo API client implementation.

use crate::api::{ArtifactsApi, TasksApi};
use crate::config::{ClientConfig, DEFAULT_BASE_URL};
use cuckoo_core::{ArtifactStream, CuckooError, Result};
use futures_util::{StreamExt, TryStreamExt};
use reqwest::multipart::Form;
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cuckoo sandbox REST client.
///
/// Cheap to clone; the base URL is fixed when the client is built and shared
/// read-only by every clone.
#[derive(Clone)]
pub struct CuckooClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: HttpClient,
    base_url: String,
}

impl CuckooClient {
    /// Create a client for the given base URL using default settings
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        CuckooClientBuilder::new().base_url(base_url).build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> CuckooClientBuilder {
        CuckooClientBuilder::new()
    }

    /// Task submission, status and deletion endpoints
    #[must_use]
    pub const fn tasks(&self) -> TasksApi<'_> {
        TasksApi::new(self)
    }

    /// Report, packet capture and screenshot endpoints
    #[must_use]
    pub const fn artifacts(&self) -> ArtifactsApi<'_> {
        ArtifactsApi::new(self)
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Perform a GET request and decode a JSON body
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.get(path).await?;
        let body = Self::expect_ok(response)?
            .text()
            .await
            .map_err(|e| CuckooError::Http(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| CuckooError::TaskInfo(e.to_string()))
    }

    /// Perform a GET request and hand the body out as a stream
    pub(crate) async fn get_stream(&self, path: &str) -> Result<ArtifactStream> {
        let response = Self::expect_ok(self.get(path).await?)?;
        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(|e| CuckooError::Http(e.to_string()))
            .boxed();
        Ok(ArtifactStream::new(status, body))
    }

    /// Perform a GET request, whatever the response status
    pub(crate) async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = self.build_url(path);
        debug!(url = %url, "GET request");

        self.inner
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CuckooError::Http(e.to_string()))
    }

    /// Perform a POST request with form data
    pub(crate) async fn post_form(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let url = self.build_url(path);
        debug!(url = %url, "POST form request");

        let response = self
            .inner
            .http
            .post(&url)
            .form(params)
            .send()
            .await
            .map_err(|e| CuckooError::Http(format!("error while sending post data to {url}: {e}")))?;

        Self::read_body(response).await
    }

    /// Perform a POST request with a multipart body
    pub(crate) async fn post_multipart(&self, path: &str, form: Form) -> Result<String> {
        let url = self.build_url(path);
        debug!(url = %url, "POST multipart request");

        let response = self
            .inner
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CuckooError::Http(format!("error while sending post data to {url}: {e}")))?;

        Self::read_body(response).await
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    /// Anything but 200 is a connectivity failure
    fn expect_ok(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status == StatusCode::OK {
            Ok(response)
        } else {
            Err(CuckooError::UnexpectedStatus {
                code: status.as_u16(),
            })
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<String> {
        Self::expect_ok(response)?
            .text()
            .await
            .map_err(|e| CuckooError::Http(e.to_string()))
    }
}

/// Builder for configuring a [`CuckooClient`]
pub struct CuckooClientBuilder {
    base_url: String,
    timeout: Option<Duration>,
    user_agent: String,
}

impl CuckooClientBuilder {
    /// Create a builder pointing at the default local sandbox
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            user_agent: format!("cuckoo-worker/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Start from a loaded configuration
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = Self::new().base_url(config.base_url.clone());
        builder.timeout = config.timeout();
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder
    }

    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Build the client
    pub fn build(self) -> Result<CuckooClient> {
        let mut http = HttpClient::builder().user_agent(&self.user_agent).gzip(true);
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let http = http
            .build()
            .map_err(|e| CuckooError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(CuckooClient {
            inner: Arc::new(ClientInner {
                http,
                base_url: self.base_url,
            }),
        })
    }
}

impl Default for CuckooClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
