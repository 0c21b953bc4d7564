//! 🔁 CursorFetcher — the half of the stream that actually talks to the service.
//!
//! 🎬 *[a cursor is born. it has thirty seconds to live. it is handed back, renewed,
//! handed back again. each time, a page of hits comes with it. each time, the counter
//! ticks up. when the counter reaches the number the service promised on day one,
//! the cursor is finally allowed to rest.]*
//!
//! 🧠 Knowledge graph:
//! - First call → `search(query)`. No retries: there is no cursor to resume from.
//! - Later calls → `fetch_next(cursor, scroll)`, retried up to `retry_limit` attempts
//!   with `retry_delay(attempt)` between them.
//! - A response without a cursor is a protocol violation. Fatal, never retried.
//! - Exhaustion is decided by count (`delivered >= declared_total`), never by an
//!   empty page. Empty pages below the total are just slow pages.
//!
//! 🦆 The duck counts hits too. The duck is always right about the total.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::common::Hit;
use crate::error::ScrollError;
use crate::scroll::{CursorToken, ScrollClient, ScrollQuery, ScrollResponse};

/// ⏱️ How long to wait before retry number `attempt` (1-based).
pub type RetryDelay = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

pub const DEFAULT_RETRY_LIMIT: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// 📈 `attempt² × base` — 500ms, 2s, 4.5s, ... with the default base.
pub fn quadratic_backoff(base: Duration) -> RetryDelay {
    Arc::new(move |attempt| base.saturating_mul(attempt.saturating_mul(attempt)))
}

/// 🔁 Attempt budget and pacing for one logical page fetch.
#[derive(Clone)]
pub struct RetryPolicy {
    limit: u32,
    delay: RetryDelay,
}

impl RetryPolicy {
    /// `limit` is the total number of attempts, first try included.
    pub fn new(limit: u32, delay: RetryDelay) -> Self {
        Self { limit, delay }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        (self.delay)(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_LIMIT, quadratic_backoff(DEFAULT_RETRY_BASE_DELAY))
    }
}

// 🎭 manual Debug because closures are shy and refuse to print themselves
impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

/// 📊 Where this stream stands against the service's promise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamState {
    /// Hits received so far. Only ever goes up.
    pub delivered: u64,
    /// `None` until the first response tells us.
    pub declared_total: Option<u64>,
    /// Once true, no request is ever sent again.
    pub terminated: bool,
}

/// 📦 What one `fetch_page` produced.
#[derive(Debug)]
pub struct PageOutcome {
    pub records: Vec<Hit>,
    pub end_of_stream: bool,
    pub declared_total: u64,
}

/// 🔖 Owns the cursor and the counters for exactly one stream.
pub struct CursorFetcher {
    client: Arc<dyn ScrollClient>,
    query: ScrollQuery,
    retry: RetryPolicy,
    cursor: Option<CursorToken>,
    state: StreamState,
    failed: bool,
}

impl std::fmt::Debug for CursorFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 🔧 the client is a trait object with no Debug. it is in there, no cap.
        f.debug_struct("CursorFetcher")
            .field("query", &self.query)
            .field("retry", &self.retry)
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl CursorFetcher {
    pub fn new(client: Arc<dyn ScrollClient>, query: ScrollQuery, retry: RetryPolicy) -> Self {
        Self {
            client,
            query,
            retry,
            cursor: None,
            state: StreamState::default(),
            failed: false,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn cursor(&self) -> Option<&CursorToken> {
        self.cursor.as_ref()
    }

    /// 📡 Fetch the next page, retrying follow-ups as the policy allows.
    ///
    /// Any error returned here is final: the fetcher terminates itself, will not
    /// send another request, and answers every later call with
    /// [`ScrollError::AlreadyFailed`].
    pub async fn fetch_page(&mut self) -> Result<PageOutcome, ScrollError> {
        if self.failed {
            return Err(ScrollError::AlreadyFailed);
        }
        if self.state.terminated {
            // 💤 the well is dry and we already told everyone. no request, no drama.
            return Ok(PageOutcome {
                records: Vec::new(),
                end_of_stream: true,
                declared_total: self.state.declared_total.unwrap_or(self.state.delivered),
            });
        }

        let result = match self.cursor.clone() {
            None => self.initial_request().await,
            Some(cursor) => self.follow_up_request(&cursor).await,
        }
        .and_then(|response| self.apply(response));

        if let Err(err) = &result {
            error!("💀 scroll fetch failed for good: {err}");
            self.failed = true;
            self.terminate();
        }
        result
    }

    async fn initial_request(&self) -> Result<ScrollResponse, ScrollError> {
        debug!(
            "🚀 opening scroll on index {:?} with lifetime {}",
            self.query.index(),
            self.query.scroll()
        );
        self.client
            .search(&self.query)
            .await
            .map_err(|source| ScrollError::InitialFetch {
                source: source.into(),
            })
    }

    async fn follow_up_request(&self, cursor: &CursorToken) -> Result<ScrollResponse, ScrollError> {
        let mut attempt = 0u32;
        loop {
            match self.client.fetch_next(cursor, self.query.scroll()).await {
                Ok(response) => return Ok(response),
                Err(source) => {
                    attempt += 1;
                    if attempt >= self.retry.limit() {
                        return Err(ScrollError::RetriesExhausted {
                            attempts: attempt,
                            source: source.into(),
                        });
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "⚠️ scroll page fetch failed, attempt {}/{}, retrying in {:?}: {:#}",
                        attempt,
                        self.retry.limit(),
                        delay,
                        source
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn apply(&mut self, response: ScrollResponse) -> Result<PageOutcome, ScrollError> {
        let Some(cursor) = response.cursor else {
            return Err(ScrollError::protocol(
                "service response carried no scroll cursor",
            ));
        };
        self.cursor = Some(cursor);

        if self.state.declared_total.is_none() {
            info!("📊 scroll declares {} total hits", response.total);
        }
        self.state.declared_total = Some(response.total);
        self.state.delivered += response.hits.len() as u64;

        let end_of_stream = self.state.delivered >= response.total;
        debug!(
            "📦 scroll page of {} hits ({}/{})",
            response.hits.len(),
            self.state.delivered,
            response.total
        );
        if end_of_stream {
            info!("🏁 scroll exhausted after {} hits", self.state.delivered);
            self.terminate();
        }

        Ok(PageOutcome {
            records: response.hits,
            end_of_stream,
            declared_total: response.total,
        })
    }

    fn terminate(&mut self) {
        self.state.terminated = true;
        self.cursor = None;
    }
}
