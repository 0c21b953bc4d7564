//! 📜 The scroll core — cursor fetching, buffering, backpressure.
//!
//! 🎬 *[narrator voice]* "The service had a million hits. The consumer had a few megabytes
//! of RAM and a dream." This module is how both of them get what they want.
//!
//! 🧠 Knowledge graph:
//! - [`ScrollQuery`]: what to ask for, and how long the cursor should live.
//! - [`ScrollClient`]: who to ask (`search` + `fetch_next`).
//! - [`CursorFetcher`]: asks, retries, counts, decides when it's over.
//! - [`ScrollStream`]: queues what the fetcher brings back and hands it out on pull.
//!
//! 🦆 The duck sits between the fetcher and the stream. It has never been asked to move.

mod client;
mod fetcher;
mod query;
mod stream;

pub use client::{CursorToken, ScrollClient, ScrollResponse};
pub use fetcher::{
    CursorFetcher, DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_LIMIT, PageOutcome, RetryDelay,
    RetryPolicy, StreamState, quadratic_backoff,
};
pub use query::ScrollQuery;
pub use stream::{
    DEFAULT_HIGH_WATER_MARK, DEFAULT_LOW_WATER_MARK, DestroyHandle, Pull, ScrollStream,
    ScrollStreamBuilder, StreamPhase,
};
