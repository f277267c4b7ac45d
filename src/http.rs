// src/http.rs

use crate::error::NilaRpError;
use async_trait::async_trait;
use base64::engine::{general_purpose::STANDARD, Engine};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// A request the relying party sends to the OP.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// A `GET` request for `url`.
    pub fn get(url: &str) -> Result<Self, NilaRpError> {
        Ok(Self {
            method: Method::GET,
            url: Url::parse(url)?,
            headers: Vec::new(),
            body: None,
        })
    }

    /// A `POST` request carrying `form` as `application/x-www-form-urlencoded`.
    pub fn post_form<T: Serialize>(url: &str, form: &T) -> Result<Self, NilaRpError> {
        let body = serde_urlencoded::to_string(form)
            .map_err(|e| NilaRpError::Internal(format!("failed to encode form body: {}", e)))?;
        Ok(Self {
            method: Method::POST,
            url: Url::parse(url)?,
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body),
        })
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Adds `client_secret_basic` credentials (RFC 6749 §2.3.1): both parts are
    /// form-urlencoded before being joined and base64-encoded.
    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        let encode = |s: &str| url::form_urlencoded::byte_serialize(s.as_bytes()).collect::<String>();
        let credentials = STANDARD.encode(format!("{}:{}", encode(username), encode(password)));
        self.header("Authorization", &format!("Basic {}", credentials))
    }

    /// Adds plain `Basic` credentials (RFC 7617) for an end user.
    pub fn user_auth(self, username: &str, password: &str) -> Self {
        let credentials = STANDARD.encode(format!("{}:{}", username, password));
        self.header("Authorization", &format!("Basic {}", credentials))
    }

    pub fn bearer_auth(self, token: &str) -> Self {
        self.header("Authorization", &format!("Bearer {}", token))
    }
}

/// The OP's answer to an [`HttpRequest`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Returns the first header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Parses the `Cache-Control` header to determine the TTL.
    pub fn cache_max_age(&self) -> Option<Duration> {
        self.header("Cache-Control")?
            .split(',')
            .find_map(|part| {
                part.trim()
                    .strip_prefix("max-age=")?
                    .parse::<u64>()
                    .ok()
                    .map(Duration::from_secs)
            })
    }
}

/// HTTP transport used for every call to the OP.
///
/// Timeouts and TLS are the implementation's business; they surface to
/// callers as ordinary errors.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, NilaRpError>;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Creates a client whose requests fail after `timeout`.
    ///
    /// Redirects are returned to the caller, not followed: the authorization
    /// endpoint hands back its result in the `Location` header.
    pub fn new(timeout: Duration) -> Result<Self, NilaRpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[instrument(skip_all, fields(method = %request.method, url = %request.url), err)]
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, NilaRpError> {
        let mut builder = self.client.request(request.method, request.url);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();
        debug!("OP responded with status {} ({} bytes)", status, body.len());

        Ok(HttpResponse { status, headers, body })
    }
}
