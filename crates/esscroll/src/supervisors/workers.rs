//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all the
//! credit in the sprint retro.
//!
//! 🚀 Two of them, one channel between:
//! - [`SourceWorker`] pulls batches off the scroll stream and shoves them into the channel.
//! - [`SinkWorker`] drains the channel into a sink, one NDJSON line at a time.
//!
//! The channel is bounded, so a slow sink stalls the source, which stalls the pulls,
//! which stops the stream from fetching. Backpressure all the way down. 🐢
//!
//! ⚠️ "If you're reading this, the code review went poorly."

use anyhow::Result;
use tokio::task::JoinHandle;

mod sink_worker;
mod source_worker;

pub(crate) use sink_worker::SinkWorker;
pub(crate) use source_worker::SourceWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// "What's the DEAL with lifetime annotations? You borrow something,
///  you give it back. It's not that hard, Jerry!" — Seinfeld, on Rust
pub(crate) trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust
    /// but verify. Mostly verify. Okay, we don't trust at all.
    fn start(self) -> JoinHandle<Result<u64>>;
}
