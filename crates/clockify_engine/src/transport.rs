use futures_util::StreamExt;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use url::Url;

use crate::config::{ApiConfig, TransportSettings};
use crate::{ApiError, FailureKind};

const API_KEY_HEADER: &str = "X-Api-Key";
const ERROR_SNIPPET_LEN: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One call against the API, relative to the configured base url.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Delete, endpoint)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, endpoint).with_body(body)
    }

    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, endpoint).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_params(mut self, params: &[(String, String)]) -> Self {
        self.query.extend(params.iter().cloned());
        self
    }

    /// Value of the last `key` query parameter.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Sends requests and hands back the decoded JSON body.
///
/// An empty body decodes to `Value::Null`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<Value, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: String,
    api_key: String,
    settings: TransportSettings,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        Url::parse(&config.base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.transport.connect_timeout)
            .timeout(config.transport.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            settings: config.transport.clone(),
            client,
        })
    }

    fn build_url(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, request.endpoint))
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Vec<u8>, ApiError> {
        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let url = self.build_url(request)?;
        let api_key = HeaderValue::from_str(&self.api_key)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let mut builder = self
            .client
            .request(request.method.as_reqwest(), url)
            .header(API_KEY_HEADER, api_key)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(body) = &request.body {
            let payload = serde_json::to_vec(body)
                .map_err(|err| ApiError::new(FailureKind::InvalidBody, err.to_string()))?;
            builder = builder.body(payload);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            // The API explains most rejections in the body; keep a short excerpt.
            let detail = self
                .read_body(response)
                .await
                .map(|bytes| body_text(&bytes))
                .unwrap_or_default();
            let message = if detail.is_empty() {
                status.to_string()
            } else {
                format!("{status}: {}", truncate(&detail, ERROR_SNIPPET_LEN))
            };
            return Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                message,
            ));
        }

        let bytes = self.read_body(response).await?;
        decode_json(&bytes)
    }
}

fn decode_json(bytes: &[u8]) -> Result<Value, ApiError> {
    let text = body_text(bytes);
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|err| ApiError::new(FailureKind::InvalidBody, err.to_string()))
}

fn body_text(bytes: &[u8]) -> String {
    let (text, _) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
    text.into_owned()
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
