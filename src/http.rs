// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::TransportError;

/// A streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// HTTP method subset used by the API client, downloader and notifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// An outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// URL-encoded form body, sent only for POST
    pub form: Vec<(String, String)>,
    /// First byte to request (`Range: bytes=<n>-`)
    pub range_start: Option<u64>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            form: Vec::new(),
            range_start: None,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a bearer token if one is available
    pub fn bearer(self, token: Option<&str>) -> Self {
        match token {
            Some(token) => self.header("Authorization", format!("Bearer {token}")),
            None => self,
        }
    }

    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    pub fn range_start(mut self, offset: u64) -> Self {
        self.range_start = Some(offset);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Look up a header value (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Encode the form fields as `application/x-www-form-urlencoded`
    pub fn encoded_form(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.form.iter())
            .finish()
    }
}

/// A fully buffered response
#[derive(Debug, Clone)]
pub struct BytesResponse {
    pub status: u16,
    pub body: Bytes,
}

impl BytesResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP response with status, content length, and body stream
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Length header value, if present
    pub content_length: Option<u64>,
    /// Response body as a stream of bytes
    pub body: ByteStream,
}

/// HTTP client abstraction for testability
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send a request and buffer the entire response body
    async fn send(&self, request: HttpRequest) -> Result<BytesResponse, TransportError>;

    /// Send a request and stream the response body, for large downloads
    async fn send_streaming(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Size of the remote resource according to a HEAD request, if reported
    async fn content_length(&self, url: &str) -> Result<Option<u64>, TransportError>;
}

/// Default HTTP client implementation using reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a new ReqwestClient with default settings
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a new ReqwestClient with a custom reqwest::Client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(offset) = request.range_start {
            builder = builder.header(reqwest::header::RANGE, format!("bytes={offset}-"));
        }

        if request.method == Method::Post && !request.form.is_empty() {
            builder = builder
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(request.encoded_form());
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<BytesResponse, TransportError> {
        let response = self.build(&request).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(BytesResponse { status, body })
    }

    async fn send_streaming(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        use futures::StreamExt;

        let response = self.build(&request).send().await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|result| result.map_err(TransportError::from)),
        );

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }

    async fn content_length(&self, url: &str) -> Result<Option<u64>, TransportError> {
        let response = self.client.head(url).send().await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        // Read the header directly; the body of a HEAD response is always empty
        let length = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok());

        Ok(length)
    }
}
