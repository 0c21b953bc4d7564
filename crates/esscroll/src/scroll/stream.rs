//! 🚰 ScrollStream — the pull buffer between an impatient consumer and a paginated service.
//!
//! 🎬 *[the consumer asks for a thousand hits. the buffer has four hundred. somewhere, a
//! fetch is already on its way. nobody starts a second one. nobody panics. the consumer
//! waits, the page lands, the queue fills, and life goes on.]*
//!
//! 🧠 Knowledge graph:
//! - The buffer is a FIFO `VecDeque<Hit>` owned by the stream and nobody else.
//! - Fetches run as a spawned task that *owns* the [`CursorFetcher`] while in flight. The
//!   fetcher comes back with the result. No fetcher at home means no second fetch.
//!   Single-flight by ownership, not by discipline.
//! - A fetch starts when the queue is below the low-water mark, or when the pending pull
//!   can't be met from what is queued.
//! - `destroy()` detaches the in-flight task instead of aborting it. Whatever it brings
//!   back is dropped on the floor.
//!
//! ```text
//! Init → InitialFetch → { Active ⇄ Fetching } → Draining → Ended
//!   any ───────────────────────────────────────────────→ Failed | Destroyed
//! ```

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::Stream;
use futures::stream;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::common::Hit;
use crate::error::ScrollError;
use crate::scroll::fetcher::{CursorFetcher, PageOutcome, RetryDelay, RetryPolicy};
use crate::scroll::fetcher::{DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_LIMIT, quadratic_backoff};
use crate::scroll::{ScrollClient, ScrollQuery};

pub const DEFAULT_LOW_WATER_MARK: usize = 1000;
pub const DEFAULT_HIGH_WATER_MARK: usize = 1000;

/// 📬 What a pull hands back.
#[derive(Debug, PartialEq, Eq)]
pub enum Pull {
    /// Between one and `n` hits, in order.
    Records(Vec<Hit>),
    /// Every declared hit has been delivered. Sent exactly once.
    EndOfStream,
    /// The stream ended, failed, or was destroyed earlier. Nothing more will come.
    Closed,
}

/// 🗺️ Where the stream is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Init,
    InitialFetch,
    Active,
    Fetching,
    Draining,
    Ended,
    Failed,
    Destroyed,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Failed | Self::Destroyed)
    }
}

type FetchTask = JoinHandle<(CursorFetcher, Result<PageOutcome, ScrollError>)>;

enum FetchSlot {
    Idle(CursorFetcher),
    InFlight(FetchTask),
    Retired,
}

/// 🔪 A cloneable kill switch for a [`ScrollStream`].
///
/// Lets another task destroy the stream while a `pull` is parked waiting on a fetch.
#[derive(Debug, Clone, Default)]
pub struct DestroyHandle {
    inner: Arc<DestroySignal>,
}

#[derive(Debug, Default)]
struct DestroySignal {
    destroyed: AtomicBool,
    notify: Notify,
}

impl DestroyHandle {
    /// 🗑️ Idempotent. The first call wins, the rest are no-ops.
    pub fn destroy(&self) {
        if !self.inner.destroyed.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    async fn destroyed(&self) {
        let mut notified = pin!(self.inner.notify.notified());
        // 🔒 register before checking, or a destroy between the two is lost forever
        notified.as_mut().enable();
        if self.is_destroyed() {
            return;
        }
        notified.await;
    }
}

/// 🏗️ Assembles a [`ScrollStream`]. `client` and `query` are required; the rest have
/// defaults: 3 attempts, `attempt² × 500ms` backoff, water marks at 1000.
#[derive(Default)]
pub struct ScrollStreamBuilder {
    client: Option<Arc<dyn ScrollClient>>,
    query: Option<ScrollQuery>,
    retry_limit: Option<u32>,
    retry_delay: Option<RetryDelay>,
    low_water_mark: Option<usize>,
    high_water_mark: Option<usize>,
}

impl ScrollStreamBuilder {
    #[must_use]
    pub fn client(mut self, client: Arc<dyn ScrollClient>) -> Self {
        self.client = Some(client);
        self
    }

    #[must_use]
    pub fn query(mut self, query: ScrollQuery) -> Self {
        self.query = Some(query);
        self
    }

    /// Total attempts per page fetch, first try included.
    #[must_use]
    pub fn retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = Some(retry_limit);
        self
    }

    #[must_use]
    pub fn retry_delay(mut self, retry_delay: RetryDelay) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    #[must_use]
    pub fn low_water_mark(mut self, low_water_mark: usize) -> Self {
        self.low_water_mark = Some(low_water_mark);
        self
    }

    #[must_use]
    pub fn high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = Some(high_water_mark);
        self
    }

    /// # Errors
    /// 💀 `Configuration` for a missing client or query, a zero retry limit, a zero
    /// high-water mark, or a low-water mark above the high-water mark.
    pub fn build(self) -> Result<ScrollStream, ScrollError> {
        let client = self
            .client
            .ok_or_else(|| ScrollError::configuration("a scroll client is required"))?;
        let query = self
            .query
            .ok_or_else(|| ScrollError::configuration("a scroll query is required"))?;

        let retry_limit = self.retry_limit.unwrap_or(DEFAULT_RETRY_LIMIT);
        if retry_limit == 0 {
            return Err(ScrollError::configuration(
                "retry limit must allow at least one attempt",
            ));
        }

        let low_water_mark = self.low_water_mark.unwrap_or(DEFAULT_LOW_WATER_MARK);
        let high_water_mark = self.high_water_mark.unwrap_or(DEFAULT_HIGH_WATER_MARK);
        if high_water_mark == 0 {
            return Err(ScrollError::configuration(
                "high water mark must be greater than zero",
            ));
        }
        if low_water_mark > high_water_mark {
            return Err(ScrollError::configuration(format!(
                "low water mark ({low_water_mark}) exceeds high water mark ({high_water_mark})"
            )));
        }

        let retry = RetryPolicy::new(
            retry_limit,
            self.retry_delay
                .unwrap_or_else(|| quadratic_backoff(DEFAULT_RETRY_BASE_DELAY)),
        );
        let query = query.with_default_page_size(high_water_mark);
        let (total_tx, _) = watch::channel(None);

        Ok(ScrollStream {
            slot: FetchSlot::Idle(CursorFetcher::new(client, query, retry)),
            buffer: VecDeque::new(),
            low_water_mark,
            high_water_mark,
            phase: StreamPhase::Init,
            total_tx,
            destroy: DestroyHandle::default(),
        })
    }
}

/// 🚰 One scroll, served one pull at a time.
pub struct ScrollStream {
    slot: FetchSlot,
    buffer: VecDeque<Hit>,
    low_water_mark: usize,
    high_water_mark: usize,
    phase: StreamPhase,
    total_tx: watch::Sender<Option<u64>>,
    destroy: DestroyHandle,
}

impl std::fmt::Debug for ScrollStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollStream")
            .field("phase", &self.phase)
            .field("buffered", &self.buffer.len())
            .field("low_water_mark", &self.low_water_mark)
            .field("high_water_mark", &self.high_water_mark)
            .finish_non_exhaustive()
    }
}

impl ScrollStream {
    pub fn builder() -> ScrollStreamBuilder {
        ScrollStreamBuilder::default()
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// 📊 The service's declared total, once the first response has landed.
    pub fn declared_total(&self) -> Option<u64> {
        *self.total_tx.borrow()
    }

    /// 📡 Watch the declared total appear. Starts at `None`.
    pub fn subscribe_total(&self) -> watch::Receiver<Option<u64>> {
        self.total_tx.subscribe()
    }

    pub fn destroy_handle(&self) -> DestroyHandle {
        self.destroy.clone()
    }

    /// 🗑️ Make the stream inert. Safe to call any number of times, from any phase.
    pub fn destroy(&mut self) {
        self.destroy.destroy();
        self.observe_destroy();
    }

    /// 📬 Pull up to `n` hits (at least one is always asked for).
    ///
    /// Waits until `n` hits are queued, or the scroll is exhausted and whatever is left
    /// can be flushed. A fatal fetch error is returned exactly once; afterwards, like
    /// after `EndOfStream` or `destroy`, every pull returns [`Pull::Closed`].
    pub async fn pull(&mut self, n: usize) -> Result<Pull, ScrollError> {
        let wanted = n.max(1);
        loop {
            self.observe_destroy();
            self.collect_finished_fetch().await?;

            match self.phase {
                StreamPhase::Ended | StreamPhase::Failed | StreamPhase::Destroyed => {
                    return Ok(Pull::Closed);
                }
                StreamPhase::Draining if self.buffer.is_empty() => {
                    self.phase = StreamPhase::Ended;
                    info!("🏁 scroll stream ended");
                    return Ok(Pull::EndOfStream);
                }
                StreamPhase::Draining => return Ok(Pull::Records(self.take(wanted))),
                _ => {}
            }

            if self.buffer.len() >= wanted {
                let records = self.take(wanted);
                // 🔄 top up behind the consumer's back, if we've dipped low enough
                self.maybe_start_fetch(0);
                return Ok(Pull::Records(records));
            }

            self.maybe_start_fetch(wanted);
            self.await_fetch().await?;
        }
    }

    /// 📦 The stream as a sequence of batches of up to `high_water_mark` hits.
    pub fn into_batches(self) -> impl Stream<Item = Result<Vec<Hit>, ScrollError>> {
        stream::unfold(Some(self), |state| async move {
            let mut scroll = state?;
            let size = scroll.high_water_mark;
            match scroll.pull(size).await {
                Ok(Pull::Records(records)) => Some((Ok(records), Some(scroll))),
                Ok(Pull::EndOfStream | Pull::Closed) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    /// 🎯 The stream as individual hits.
    pub fn into_hits(self) -> impl Stream<Item = Result<Hit, ScrollError>> {
        use futures::StreamExt;

        self.into_batches().flat_map(|batch| {
            let items: Vec<Result<Hit, ScrollError>> = match batch {
                Ok(records) => records.into_iter().map(Ok).collect(),
                Err(err) => vec![Err(err)],
            };
            stream::iter(items)
        })
    }

    fn take(&mut self, n: usize) -> Vec<Hit> {
        let count = n.min(self.buffer.len());
        self.buffer.drain(..count).collect()
    }

    /// 🚀 Start a fetch if the fetcher is home and the queue wants more.
    fn maybe_start_fetch(&mut self, wanted: usize) {
        if !matches!(self.phase, StreamPhase::Init | StreamPhase::Active) {
            return;
        }
        let queued = self.buffer.len();
        if queued >= wanted && queued >= self.low_water_mark {
            return;
        }

        if !matches!(self.slot, FetchSlot::Idle(_)) {
            // 🔒 nobody home: a fetch is already out, or the fetcher retired
            return;
        }
        let FetchSlot::Idle(mut fetcher) = std::mem::replace(&mut self.slot, FetchSlot::Retired)
        else {
            return;
        };

        self.phase = if self.phase == StreamPhase::Init {
            StreamPhase::InitialFetch
        } else {
            StreamPhase::Fetching
        };
        debug!("📡 starting scroll fetch with {queued} hits queued");
        self.slot = FetchSlot::InFlight(tokio::spawn(async move {
            let outcome = fetcher.fetch_page().await;
            (fetcher, outcome)
        }));
    }

    /// ⏳ Wait for the in-flight fetch, or for someone to pull the plug.
    ///
    /// The handle stays in the slot while we wait, so a caller that drops this future
    /// mid-wait leaves the fetch right where the next pull can pick it up.
    async fn await_fetch(&mut self) -> Result<(), ScrollError> {
        let FetchSlot::InFlight(task) = &mut self.slot else {
            return Ok(());
        };

        let destroy = self.destroy.clone();
        let joined = tokio::select! {
            joined = task => Some(joined),
            () = destroy.destroyed() => None,
        };

        match joined {
            Some(joined) => {
                // 📬 the task is done. now, and only now, the slot lets go of it.
                self.slot = FetchSlot::Retired;
                self.apply(joined)
            }
            None => {
                // 🗑️ the task is detached, not aborted; its result has nowhere to land
                self.observe_destroy();
                Ok(())
            }
        }
    }

    /// 🧹 Apply an in-flight fetch that already finished, without blocking.
    async fn collect_finished_fetch(&mut self) -> Result<(), ScrollError> {
        let finished = matches!(&self.slot, FetchSlot::InFlight(task) if task.is_finished());
        if finished {
            self.await_fetch().await
        } else {
            Ok(())
        }
    }

    fn apply(
        &mut self,
        joined: Result<(CursorFetcher, Result<PageOutcome, ScrollError>), tokio::task::JoinError>,
    ) -> Result<(), ScrollError> {
        if self.phase.is_terminal() {
            return Ok(());
        }

        let outcome = match joined {
            Ok((fetcher, Ok(outcome))) => {
                if !outcome.end_of_stream {
                    self.slot = FetchSlot::Idle(fetcher);
                }
                outcome
            }
            Ok((_, Err(err))) => return Err(self.fail(err)),
            Err(join_err) => return Err(self.fail(ScrollError::from(join_err))),
        };

        if *self.total_tx.borrow() != Some(outcome.declared_total) {
            self.total_tx.send_replace(Some(outcome.declared_total));
        }
        self.buffer.extend(outcome.records);
        self.phase = if outcome.end_of_stream {
            StreamPhase::Draining
        } else {
            StreamPhase::Active
        };
        Ok(())
    }

    fn fail(&mut self, err: ScrollError) -> ScrollError {
        error!("💀 scroll stream failed: {err}");
        self.buffer.clear();
        self.slot = FetchSlot::Retired;
        self.phase = StreamPhase::Failed;
        err
    }

    fn observe_destroy(&mut self) {
        if !self.destroy.is_destroyed() || self.phase == StreamPhase::Destroyed {
            return;
        }
        self.buffer.clear();
        // 🔌 dropping a JoinHandle detaches the task; the request finishes into the void
        self.slot = FetchSlot::Retired;
        if !self.phase.is_terminal() {
            debug!("🗑️ scroll stream destroyed in phase {:?}", self.phase);
            self.phase = StreamPhase::Destroyed;
        }
    }
}
