//! 📜 esscroll — pull-based streaming over Elasticsearch-style scroll cursors.
//!
//! 🎬 "In a world where result sets never end... one cursor dared to keep scrolling."
//!
//! The library core is [`scroll::ScrollStream`]: hand it a [`scroll::ScrollClient`] and a
//! [`scroll::ScrollQuery`], then `pull(n)` hits until it says it's done. Around it sit the
//! Elasticsearch client, sinks, config, and a small supervisor that wires them into a
//! pipeline for the CLI. 🦆

pub mod app_config;
pub mod backends;
pub mod common;
pub mod error;
pub mod progress;
pub mod scroll;
mod supervisors;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::app_config::AppConfig;
use crate::backends::{ElasticsearchScrollClient, SinkBackend};
use crate::supervisors::{Supervisor, build_sink};

pub use crate::common::Hit;
pub use crate::error::ScrollError;
pub use crate::scroll::{Pull, ScrollClient, ScrollQuery, ScrollStream, StreamPhase};

/// 🚀 Scroll the configured cluster into the configured sink. Returns hits written.
pub async fn run(app_config: AppConfig) -> Result<u64> {
    let client = ElasticsearchScrollClient::new(app_config.source_config.clone())
        .context("💀 Could not build the Elasticsearch client")?;
    let sink = build_sink(&app_config.sink_config).await?;
    run_with(app_config, Arc::new(client), sink).await
}

/// 🧪 Same pipeline, bring your own client and sink.
pub async fn run_with(
    app_config: AppConfig,
    client: Arc<dyn ScrollClient>,
    sink: SinkBackend,
) -> Result<u64> {
    Supervisor::new(app_config)
        .start_workers(client, sink)
        .await
        .context("💀 The scroll pipeline did not make it to the end credits")
}
