//! 📡 The scroll client contract — two verbs, one cursor, infinite patience.
//!
//! Anything that can `search` and `fetch_next` can back a [`ScrollStream`](super::ScrollStream):
//! the Elasticsearch HTTP client, the in-memory script used by tests, or whatever the
//! singularity ends up running its search cluster on.

use anyhow::Result;
use async_trait::async_trait;

use crate::common::Hit;
use crate::scroll::ScrollQuery;

/// 🔖 Opaque cursor handle issued by the service. We hold it, we hand it back, we never peek.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CursorToken(String);

impl CursorToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CursorToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 📦 One page as the service described it.
///
/// `cursor` is an `Option` only because the wire format allows it to be absent.
/// The fetcher treats absence as a protocol violation, not as "done".
#[derive(Debug, Clone)]
pub struct ScrollResponse {
    pub cursor: Option<CursorToken>,
    pub hits: Vec<Hit>,
    pub total: u64,
}

/// 🚰 A remote service that speaks scroll.
///
/// # Contract
/// - `search` opens a cursor with the initial query and returns the first page.
/// - `fetch_next` continues from `cursor`, extending its lifetime by `scroll`.
/// - Both are read-only against the service.
/// - One stream never calls these concurrently. Several streams sharing one client
///   might, which is why the trait demands `Send + Sync`; whether the transport
///   actually enjoys that is between you and your transport.
#[async_trait]
pub trait ScrollClient: Send + Sync {
    async fn search(&self, query: &ScrollQuery) -> Result<ScrollResponse>;

    async fn fetch_next(&self, cursor: &CursorToken, scroll: &str) -> Result<ScrollResponse>;
}
