//! # Previously, on esscroll...
//!
//! 🎬 The cluster was down. The demo was in ten minutes. Someone had to pretend to be
//! Elasticsearch, convincingly, with nothing but a `Vec` and a dream.
//!
//! That someone was this module.
//!
//! `in_mem` provides a scripted [`ScrollClient`] and an in-memory [`Sink`]:
//! - [`InMemoryScrollClient`] serves a fixed list of hits page by page. Its cursor is
//!   just the offset of the next page (`scroll@<offset>`), so it is honest about where
//!   it resumes. It can be told to fail, stall, or forget its cursor at a given offset,
//!   and it counts every call, including how many were ever in flight at once.
//! - [`InMemorySink`] hoards received batches behind an `Arc<Mutex<...>>` so tests can
//!   peek after handing it off.
//!
//! 🦆
//!
//! ⚠️ This is NOT for production. If you're deploying this to prod, please also deploy a therapist.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use crate::backends::Sink;
use crate::common::Hit;
use crate::scroll::{CursorToken, ScrollClient, ScrollQuery, ScrollResponse};

/// 🧪 `{"doc":0}` through `{"doc":count-1}`. Fake docs. They don't know. Please don't tell them.
pub fn numbered_hits(count: usize) -> Vec<Hit> {
    (0..count)
        .map(|doc| Hit::from_json(format!(r#"{{"doc":{doc}}}"#)))
        .collect::<Result<_>>()
        .unwrap_or_default()
}

/// 📦 A scroll service that lives entirely in RAM.
#[derive(Debug, Default)]
pub struct InMemoryScrollClient {
    hits: Vec<Hit>,
    page_size: usize,
    declared_total: Option<u64>,
    latency: Duration,
    fail_search: bool,
    failures_at: Mutex<HashMap<usize, u32>>,
    stalls_at: Mutex<HashMap<usize, u32>>,
    cursorless_at: Option<usize>,
    search_calls: AtomicUsize,
    fetch_next_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    scroll_lifetimes: Mutex<Vec<String>>,
}

impl InMemoryScrollClient {
    /// 🚀 Serve `hits` in pages of `page_size` (at least one hit per page).
    pub fn new(hits: Vec<Hit>, page_size: usize) -> Self {
        Self {
            hits,
            page_size: page_size.max(1),
            ..Self::default()
        }
    }

    /// 📊 Claim a different total than the hits we actually hold.
    #[must_use]
    pub fn with_declared_total(mut self, total: u64) -> Self {
        self.declared_total = Some(total);
        self
    }

    /// 🐌 Sleep this long inside every call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 💀 Every `search` fails.
    #[must_use]
    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    /// 💀 The next `times` calls resuming at `offset` fail.
    #[must_use]
    pub fn failing_at(self, offset: usize, times: u32) -> Self {
        self.script(&self.failures_at, offset, times);
        self
    }

    /// 💤 The next `times` calls resuming at `offset` return an empty page, same cursor.
    #[must_use]
    pub fn stalling_at(self, offset: usize, times: u32) -> Self {
        self.script(&self.stalls_at, offset, times);
        self
    }

    /// 🙈 The page starting at `offset` comes back without a cursor.
    #[must_use]
    pub fn without_cursor_at(mut self, offset: usize) -> Self {
        self.cursorless_at = Some(offset);
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_next_calls(&self) -> usize {
        self.fetch_next_calls.load(Ordering::SeqCst)
    }

    /// 🔒 The most calls that were ever running at the same moment.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn scroll_lifetimes_seen(&self) -> Vec<String> {
        self.scroll_lifetimes
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    fn script(&self, table: &Mutex<HashMap<usize, u32>>, offset: usize, times: u32) {
        if let Ok(mut table) = table.lock() {
            table.insert(offset, times);
        }
    }

    /// 🎲 Spend one scripted event for `offset`, if any are left.
    fn consume(table: &Mutex<HashMap<usize, u32>>, offset: usize) -> bool {
        let Ok(mut table) = table.lock() else {
            return false;
        };
        match table.get_mut(&offset) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    async fn serve(&self, offset: usize) -> Result<ScrollResponse> {
        let _in_flight = InFlight::enter(&self.in_flight, &self.max_in_flight);
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }

        if Self::consume(&self.failures_at, offset) {
            bail!("💀 scripted failure at offset {offset}");
        }

        let total = self.declared_total.unwrap_or(self.hits.len() as u64);
        if Self::consume(&self.stalls_at, offset) {
            return Ok(ScrollResponse {
                cursor: Some(CursorToken::new(format!("scroll@{offset}"))),
                hits: Vec::new(),
                total,
            });
        }

        let start = offset.min(self.hits.len());
        let end = (offset + self.page_size).min(self.hits.len());
        let cursor = (self.cursorless_at != Some(offset))
            .then(|| CursorToken::new(format!("scroll@{end}")));
        Ok(ScrollResponse {
            cursor,
            hits: self.hits[start..end].to_vec(),
            total,
        })
    }
}

#[async_trait]
impl ScrollClient for InMemoryScrollClient {
    async fn search(&self, _query: &ScrollQuery) -> Result<ScrollResponse> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search {
            let _in_flight = InFlight::enter(&self.in_flight, &self.max_in_flight);
            tokio::task::yield_now().await;
            bail!("💀 scripted search failure");
        }
        self.serve(0).await
    }

    async fn fetch_next(&self, cursor: &CursorToken, scroll: &str) -> Result<ScrollResponse> {
        self.fetch_next_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.scroll_lifetimes.lock() {
            seen.push(scroll.to_string());
        }
        let offset = cursor
            .as_str()
            .strip_prefix("scroll@")
            .and_then(|offset| offset.parse::<usize>().ok())
            .ok_or_else(|| anyhow!("💀 unknown scroll cursor '{cursor}'"))?;
        self.serve(offset).await
    }
}

/// 🔒 Counts a call as in flight for as long as it lives.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, high_score: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        high_score.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 📦 A sink that never forgets.
///
/// Clone-able because tests need to peek inside after handing `self` off to the
/// pipeline. The `Arc` means everyone shares the same Vec.
#[derive(Debug, Default, Clone)]
pub struct InMemorySink {
    pub(crate) received: std::sync::Arc<tokio::sync::Mutex<Vec<Hit>>>,
    pub(crate) closed: std::sync::Arc<std::sync::atomic::AtomicBool>,
    fail_receive: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🔍 Everything received so far, in arrival order.
    pub async fn received(&self) -> Vec<Hit> {
        self.received.lock().await.clone()
    }

    /// 💀 Every `receive` fails. `close` still works, because somebody has to.
    #[must_use]
    pub fn failing_receive(mut self) -> Self {
        self.fail_receive = true;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn receive(&mut self, batch: Vec<Hit>) -> Result<()> {
        if self.fail_receive {
            bail!("💀 scripted receive failure");
        }
        // 🔒 the Mutex is load-bearing. do not remove. I know it looks optional. it isn't.
        self.received.lock().await.extend(batch);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
