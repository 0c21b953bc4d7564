//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! *Previously, on esscroll...*
//!
//! 🎬 COLD OPEN — INT. SERVER ROOM — 3:47 AM
//!
//! Someone asked for "all of it". Forty million documents. The `from`/`size` pagination
//! gave up at ten thousand and filed a complaint. Only one API was brave enough to
//! keep going: the scroll.
//!
//! 🚀 This module is the HTTP half of a scroll conversation:
//! - `POST {url}/{index}/_search?scroll={ttl}` opens the cursor and brings back page one.
//! - `POST {url}/_search/scroll` with `{"scroll", "scroll_id"}` brings back every page after.
//!
//! Hits travel as raw JSON. We never parse a document we don't have to.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::common::Hit;
use crate::error::ScrollError;
use crate::scroll::{CursorToken, ScrollClient, ScrollQuery, ScrollResponse};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn default_scroll() -> String {
    "30s".to_string()
}

fn default_query() -> Value {
    json!({ "query": { "match_all": {} } })
}

fn default_request_timeout_secs() -> u64 {
    30
}

// 📡 ElasticsearchSourceConfig — "It's just Elasticsearch", she said, before the cluster went red.
//
// 🔧 auth is tri-modal: api_key, username+password, or "I hope anonymous works" (it might, in dev).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ElasticsearchSourceConfig {
    /// 📡 The URL of your Elasticsearch cluster. Include scheme + port. Yes, all of it.
    pub url: String,
    /// 🔒 Username for basic auth. Optional, like flossing.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Password. If this is in plaintext in your config file, I've already filed a complaint
    /// with the Department of Security Choices.
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key auth. Wins over basic auth when both are set. Hierarchy.
    #[serde(default)]
    pub api_key: Option<String>,
    /// 🎯 Index (or comma list, or pattern) to scroll. None scrolls the whole cluster. Brave.
    #[serde(default)]
    pub index: Option<String>,
    /// ⏳ How long the cluster keeps the cursor alive between our requests.
    #[serde(default = "default_scroll")]
    pub scroll: String,
    /// 🔍 The search body. Defaults to `match_all`, the "I'll take everything" of queries.
    #[serde(default = "default_query")]
    pub query: Value,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ElasticsearchSourceConfig {
    /// 🏗️ A config with every default filled in. Handy for tests and for people who trust defaults.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            api_key: None,
            index: None,
            scroll: default_scroll(),
            query: default_query(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// 📜 The scroll query this config describes.
    pub fn scroll_query(&self) -> Result<ScrollQuery, ScrollError> {
        ScrollQuery::new(self.index.clone(), self.query.clone(), self.scroll.clone())
    }
}

// ===== Wire format =====

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<Box<RawValue>>,
}

/// 🔢 ES ≤ 6 says `"total": 42`. ES ≥ 7 says `"total": {"value": 42, "relation": "eq"}`.
/// We accept both and don't ask which decade your cluster is from.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Tracked { value: u64 },
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            TotalHits::Count(value) | TotalHits::Tracked { value } => *value,
        }
    }
}

/// 📦 The Elasticsearch scroll client.
#[derive(Debug)]
pub struct ElasticsearchScrollClient {
    // 📡 reqwest::Client — the envoy we send into the HTTP wilderness. Reused across requests.
    client: reqwest::Client,
    source_config: ElasticsearchSourceConfig,
}

impl ElasticsearchScrollClient {
    /// 🚀 Builds the HTTP client: 10s to connect, `request_timeout_secs` for everything else.
    pub fn new(source_config: ElasticsearchSourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(source_config.request_timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept. The architect shrugged. Probably a missing TLS cert or a cursed system OpenSSL. Either way: tragic.")?;
        Ok(Self {
            client,
            source_config,
        })
    }

    fn base_url(&self) -> &str {
        self.source_config.url.trim_end_matches('/')
    }

    fn search_url(&self, query: &ScrollQuery) -> String {
        match query.index() {
            Some(index) => format!("{}/{}/_search", self.base_url(), index),
            None => format!("{}/_search", self.base_url()),
        }
    }

    /// 🔒 API key first, basic auth second, nothing third.
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.source_config.api_key {
            request.header("Authorization", format!("ApiKey {}", api_key))
        } else if let Some(ref username) = self.source_config.username {
            request.basic_auth(username, self.source_config.password.as_ref())
        } else {
            request
        }
    }

    async fn post(&self, request: reqwest::RequestBuilder, body: &Value) -> Result<ScrollResponse> {
        let payload = serde_json::to_vec(body)
            .context("💀 Could not serialize the request body. JSON refused to JSON.")?;
        let response = self
            .authorize(request)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .context("💀 The request never made it to Elasticsearch. We launched it into the network and the network was not vibing with it. Check connectivity, check timeouts, check your feelings.")?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .context("💀 Elasticsearch started answering and then trailed off mid-sentence.")?;
        if !status.is_success() {
            bail!(
                "💀 Elasticsearch said {}: {}",
                status,
                String::from_utf8_lossy(&bytes)
            );
        }

        let parsed: SearchResponse = serde_json::from_slice(&bytes)
            .context("💀 Elasticsearch replied, but not in any dialect of scroll we speak.")?;
        let Some(total) = parsed.hits.total else {
            bail!("💀 The response carried no hits.total. We can't know when to stop without it.");
        };
        trace!(
            "📬 page of {} hits, total {}",
            parsed.hits.hits.len(),
            total.value()
        );

        Ok(ScrollResponse {
            cursor: parsed.scroll_id.map(CursorToken::new),
            hits: parsed.hits.hits.into_iter().map(Hit::from_raw).collect(),
            total: total.value(),
        })
    }
}

#[async_trait]
impl ScrollClient for ElasticsearchScrollClient {
    async fn search(&self, query: &ScrollQuery) -> Result<ScrollResponse> {
        let url = self.search_url(query);
        let mut body = query.body().clone();
        // 🔢 without this, ES 7+ caps the count at 10k and our end-of-stream math lies
        if let Value::Object(fields) = &mut body {
            fields
                .entry("track_total_hits")
                .or_insert(Value::Bool(true));
        }
        debug!("📡 opening scroll at {} (lifetime {})", url, query.scroll());
        // ⏳ lifetimes look like "30s" / "1m", nothing that needs escaping
        let request = self
            .client
            .post(format!("{}?scroll={}", url, query.scroll()));
        self.post(request, &body)
            .await
            .with_context(|| format!("💀 Opening the scroll at '{}' went sideways", url))
    }

    async fn fetch_next(&self, cursor: &CursorToken, scroll: &str) -> Result<ScrollResponse> {
        let url = format!("{}/_search/scroll", self.base_url());
        let body = json!({ "scroll": scroll, "scroll_id": cursor.as_str() });
        debug!("📡 continuing scroll (lifetime {})", scroll);
        let request = self.client.post(&url);
        self.post(request, &body)
            .await
            .context("💀 Continuing the scroll went sideways")
    }
}
