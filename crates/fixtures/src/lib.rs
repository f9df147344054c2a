#![deny(missing_docs)]
//! Data-loading serialization fixtures.
//!
//! Two loaders mirror the runtime's page-level and server-level load
//! functions: one JSON document is fetched through every transport
//! shape the runtime offers, and the decoded values must agree no
//! matter which path the bytes took. Each loader sums the four reads,
//! so a correct round trip yields exactly four times the stored field.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Shared endpoint read by the page loader, resolved against the page
/// origin.
const SHARED_ENDPOINT: &str = "/load/serialization/fetched-from-shared.json";
/// Endpoint read by the server loader, fetched by relative path.
const SERVER_ENDPOINT: &str = "/load/serialization/fetched-from-server.json";

/// Errors a fixture loader can surface.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// No route matches the fetched path.
    #[error("no route for {0}")]
    NotFound(String),
    /// A body failed to parse as JSON.
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
    /// A body's bytes are not UTF-8.
    #[error("body is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// The decoded document has no numeric value under the field.
    #[error("missing numeric field `{0}`")]
    MissingField(String),
    /// The four transports decoded different values.
    #[error("transports disagree on `{field}`: {values:?}")]
    TransportSkew {
        /// Field the transports were asked for.
        field: String,
        /// Decoded values in json, text, buffer, stream order.
        values: [i64; 4],
    },
}

/// A fetched response body, decodable through any transport shape.
#[derive(Debug, Clone)]
pub struct Response {
    body: Vec<u8>,
}

impl Response {
    /// Wraps raw bytes as a response body.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Response { body: body.into() }
    }

    /// Parses the body directly as JSON.
    pub fn json(&self) -> Result<JsonValue, FixtureError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decodes the body as UTF-8 text.
    pub fn text(&self) -> Result<String, FixtureError> {
        Ok(String::from_utf8(self.body.clone())?)
    }

    /// The raw byte buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Streams the body in fixed-size chunks.
    pub fn chunks(&self, size: usize) -> impl Iterator<Item = &[u8]> {
        self.body.chunks(size)
    }
}

/// Transport seam handed to the loaders, standing in for the runtime's
/// `fetch`.
pub trait Fetcher {
    /// Issues one request for `path` and returns its response.
    fn fetch(&self, path: &str) -> Result<Response, FixtureError>;
}

/// In-memory fetcher serving canned bodies by path.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    routes: HashMap<String, String>,
}

impl StaticFetcher {
    /// An empty route table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `body` at `path`.
    pub fn route(mut self, path: impl Into<String>, body: impl Into<String>) -> Self {
        self.routes.insert(path.into(), body.into());
        self
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, path: &str) -> Result<Response, FixtureError> {
        self.routes
            .get(path)
            .map(|body| Response::new(body.as_bytes()))
            .ok_or_else(|| FixtureError::NotFound(path.to_string()))
    }
}

/// Server-loader output, serialized to the client and handed back to
/// the page loader as `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerData {
    /// Four-ways sum of the server endpoint's `a` field.
    pub a: i64,
}

/// Page-loader output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageData {
    /// Passed through from the server loader.
    pub a: i64,
    /// Four-ways sum of the shared endpoint's `b` field.
    pub b: i64,
    /// `a + b`, proving both halves arrived intact.
    pub c: i64,
}

/// The URL a page loads under. Only the origin matters here; the
/// shared endpoint is resolved against it.
#[derive(Debug, Clone)]
pub struct PageUrl {
    /// Scheme and host, no trailing slash.
    pub origin: String,
}

/// What the runtime hands a page-level load function.
pub struct LoadEvent<'a> {
    /// Per-request fetch.
    pub fetch: &'a dyn Fetcher,
    /// Output of the server loader for the same navigation.
    pub data: ServerData,
    /// URL of the page being loaded.
    pub url: PageUrl,
}

/// Reads `path` once per transport shape and sums the decoded values
/// of `field` across all four reads.
///
/// Every transport issues its own request, so the sum only comes out
/// right when the endpoint serializes identically on repeat reads.
pub fn fetch_four_ways(
    fetch: &dyn Fetcher,
    path: &str,
    field: &str,
) -> Result<i64, FixtureError> {
    let json = field_value(&fetch.fetch(path)?.json()?, field)?;

    let document: JsonValue = serde_json::from_str(&fetch.fetch(path)?.text()?)?;
    let text = field_value(&document, field)?;

    let response = fetch.fetch(path)?;
    let decoded = String::from_utf8(response.bytes().to_vec())?;
    let buffer = field_value(&serde_json::from_str(&decoded)?, field)?;

    let response = fetch.fetch(path)?;
    let mut reassembled = Vec::new();
    for chunk in response.chunks(16) {
        reassembled.extend_from_slice(chunk);
    }
    let document: JsonValue = serde_json::from_str(&String::from_utf8(reassembled)?)?;
    let stream = field_value(&document, field)?;

    let values = [json, text, buffer, stream];
    if values.iter().any(|value| *value != json) {
        return Err(FixtureError::TransportSkew {
            field: field.to_string(),
            values,
        });
    }
    Ok(json + text + buffer + stream)
}

fn field_value(document: &JsonValue, field: &str) -> Result<i64, FixtureError> {
    document
        .get(field)
        .and_then(JsonValue::as_i64)
        .ok_or_else(|| FixtureError::MissingField(field.to_string()))
}

/// Page-level load: combines the server data with a four-ways fetch of
/// the shared endpoint.
pub fn load_page(event: &LoadEvent<'_>) -> Result<PageData, FixtureError> {
    let a = event.data.a;
    let url = format!("{}{SHARED_ENDPOINT}", event.url.origin);
    let b = fetch_four_ways(event.fetch, &url, "b")?;
    Ok(PageData { a, b, c: a + b })
}

/// Server-level load: a four-ways fetch of the server endpoint.
pub fn load_server(fetch: &dyn Fetcher) -> Result<ServerData, FixtureError> {
    let a = fetch_four_ways(fetch, SERVER_ENDPOINT, "a")?;
    Ok(ServerData { a })
}
