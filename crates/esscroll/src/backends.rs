//! 🔌 Backends — where the real I/O happens.
//!
//! 🚰 Scroll clients pour the data in, sinks slurp it up.
//! And in between, we panic! (kidding, we use anyhow)
//!
//! 🎭 This module is the casting agency. Need to scroll a real Elasticsearch cluster?
//! Pretend to be one from RAM? Dump everything as NDJSON? We've got a backend for that.
//!
//! 🦆 The duck is here because every file must have one. This is law. Do not question the duck.

use anyhow::Result;
use async_trait::async_trait;

use crate::common::Hit;

pub mod elasticsearch;
pub mod file;
pub mod in_mem;

// 🎯 Re-exports so callers can write `backends::FileSink` instead of spelunking.
pub use elasticsearch::{ElasticsearchScrollClient, ElasticsearchSourceConfig};
pub use file::{FileSink, FileSinkConfig};
pub use in_mem::{InMemoryScrollClient, InMemorySink};

// ===== Sink Trait and Backend Enum =====

/// 🕳️ A sink that consumes hits.
///
/// # Contract
/// - `receive` accepts a batch, in order, and does something useful with it. Hopefully.
/// - `close` flushes, finalizes, and bids the data a fond farewell. MUST be called.
///   Skipping `close` is a bug. It is also considered rude.
#[async_trait]
pub trait Sink: std::fmt::Debug + Send {
    /// 📥 Accept a batch of hits and write/forward/stash them somewhere meaningful.
    async fn receive(&mut self, batch: Vec<Hit>) -> Result<()>;
    /// 🗑️ Flush, finalize, and release. Call this. Always. No exceptions. Not even on Fridays.
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a Sink — a polymorphic casting call for data destinations.
///
/// The enum dispatches `receive` and `close` to the inner concrete type, keeping the
/// supervisor blissfully ignorant of where data actually lands.
#[derive(Debug)]
pub enum SinkBackend {
    InMemory(InMemorySink),
    File(FileSink),
}

#[async_trait]
impl Sink for SinkBackend {
    async fn receive(&mut self, batch: Vec<Hit>) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.receive(batch).await,
            SinkBackend::File(sink) => sink.receive(batch).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.close().await,
            SinkBackend::File(sink) => sink.close().await,
        }
    }
}
