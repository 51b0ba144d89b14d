//! The remote highlight service.
//!
//! One endpoint, `POST <host>/highlight`, takes a batch of blocks and returns
//! whatever it managed to highlight, keyed by block id:
//!
//! ```text
//! -> {"blocks": [{"id": "1", "language": "php", "code": "...", "theme": "nord"}]}
//! <- {"blocks": [{"id": "1", "wrapped": "...", "highlighted": "...", "styles": "...", "classes": "..."}]}
//! ```
//!
//! Every response field other than `id` is optional.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::block::{Block, Rendered};
use crate::config::Config;
use crate::error::{Error, RequestError};

/// Something that can highlight a batch of blocks.
///
/// [`HttpService`] is the real implementation; tests substitute fakes.
pub trait HighlightService: Send + Sync {
    /// Send one batch. Exactly one round trip per call.
    fn highlight(
        &self,
        token: &str,
        request: &HighlightRequest<'_>,
    ) -> Result<HighlightResponse, RequestError>;
}

/// Request body.
#[derive(Debug, Serialize)]
pub struct HighlightRequest<'a> {
    pub blocks: Vec<BlockRequest<'a>>,
}

impl<'a> HighlightRequest<'a> {
    pub fn new<I>(blocks: I) -> Self
    where
        I: IntoIterator<Item = &'a Block>,
    {
        Self {
            blocks: blocks.into_iter().map(BlockRequest::from).collect(),
        }
    }
}

/// One block as sent to the service: its inputs, options inlined.
#[derive(Debug, Serialize)]
pub struct BlockRequest<'a> {
    pub id: &'a str,
    pub language: &'a str,
    pub code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<&'a str>,
    #[serde(flatten)]
    pub options: &'a BTreeMap<String, Value>,
}

impl<'a> From<&'a Block> for BlockRequest<'a> {
    fn from(block: &'a Block) -> Self {
        Self {
            id: &block.id,
            language: &block.language,
            code: &block.code,
            theme: block.theme.as_deref(),
            options: &block.options,
        }
    }
}

/// Response body.
#[derive(Debug, Default, Deserialize)]
pub struct HighlightResponse {
    #[serde(default)]
    pub blocks: Option<Vec<BlockResponse>>,
}

impl HighlightResponse {
    /// Index the returned blocks by id. Later duplicates win.
    pub fn into_map(self) -> HashMap<String, Rendered> {
        self.blocks
            .unwrap_or_default()
            .into_iter()
            .map(|b| (b.id, b.rendered))
            .collect()
    }
}

/// One highlighted block in a response.
#[derive(Debug, Deserialize)]
pub struct BlockResponse {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(flatten)]
    pub rendered: Rendered,
}

/// Ids are strings on our side, but the service echoes numeric ids as numbers.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "block id must be a string or number, got {other}"
        ))),
    }
}

/// [`HighlightService`] over HTTPS with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpService {
    client: reqwest::blocking::Client,
    host: String,
    endpoint: String,
}

impl HttpService {
    pub fn new(host: &str, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("torchlight-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RequestError::Transport)?;

        Ok(Self {
            client,
            host: host.to_string(),
            endpoint: format!("{}/highlight", host.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Self::new(&config.host, config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl HighlightService for HttpService {
    fn highlight(
        &self,
        token: &str,
        request: &HighlightRequest<'_>,
    ) -> Result<HighlightResponse, RequestError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(request)
            .send()
            .map_err(|e| RequestError::from_reqwest(&self.host, e))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| RequestError::from_reqwest(&self.host, e))?;

        if !status.is_success() {
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| RequestError::MalformedResponse(e.to_string()))
    }
}
