//! HTTP transport used by the staging client.
//!
//! The client only needs three verbs. They sit behind [`Transport`] so the
//! protocol logic can be exercised without a server.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::StageError;

/// Content type of every request body sent to the staging API.
pub const XML_CONTENT_TYPE: &str = "application/xml; charset=UTF-8";

/// Status and fully-read body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Protocol for the HTTP calls made by the staging client.
///
/// Implementations authenticate every request and read response bodies to
/// the end before returning so pooled connections can be reused.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a GET request.
    async fn get(&self, url: &Url) -> Result<HttpResponse, StageError>;

    /// Issues a HEAD request and returns the status code.
    async fn head(&self, url: &Url) -> Result<u16, StageError>;

    /// POSTs an XML document.
    async fn post_xml(&self, url: &Url, body: String) -> Result<HttpResponse, StageError>;
}

/// Builds the value of a Basic `Authorization` header.
///
/// Credentials are encoded as ISO-8859-1; characters outside that range are
/// replaced with `?`.
#[must_use]
pub fn basic_auth_header(username: &str, password: &str) -> String {
    let latin1: Vec<u8> = format!("{username}:{password}")
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect();
    format!("Basic {}", STANDARD.encode(latin1))
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    authorization: HeaderValue,
}

impl ReqwestTransport {
    /// Creates a transport from the connection settings in `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, StageError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout()? {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| StageError::Config(format!("cannot build HTTP client: {e}")))?;

        let mut authorization =
            HeaderValue::from_str(&basic_auth_header(&config.username, &config.password))
                .map_err(|e| StageError::Config(format!("invalid credentials: {e}")))?;
        authorization.set_sensitive(true);

        Ok(Self {
            client,
            authorization,
        })
    }

    async fn send(
        &self,
        method: &'static str,
        url: &Url,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, StageError> {
        debug!(method, url = %url, "Sending request");
        request
            .header(AUTHORIZATION, self.authorization.clone())
            .send()
            .await
            .map_err(|source| StageError::Transport {
                method,
                url: url.to_string(),
                source,
            })
    }

    async fn read(
        method: &'static str,
        url: &Url,
        response: reqwest::Response,
    ) -> Result<HttpResponse, StageError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|source| StageError::Transport {
                method,
                url: url.to_string(),
                source,
            })?;
        debug!(method, url = %url, status, bytes = body.len(), "Received response");
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, StageError> {
        let request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/xml");
        let response = self.send("GET", url, request).await?;
        Self::read("GET", url, response).await
    }

    async fn head(&self, url: &Url) -> Result<u16, StageError> {
        let response = self.send("HEAD", url, self.client.head(url.clone())).await?;
        let status = response.status().as_u16();
        debug!(url = %url, status, "Received HEAD response");
        Ok(status)
    }

    async fn post_xml(&self, url: &Url, body: String) -> Result<HttpResponse, StageError> {
        let request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .header(ACCEPT, "application/xml")
            .body(body);
        let response = self.send("POST", url, request).await?;
        Self::read("POST", url, response).await
    }
}
