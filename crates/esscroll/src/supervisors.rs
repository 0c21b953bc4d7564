//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 *[dramatic orchestral music swells]*
//! 🎬 "In a world where workers toil endlessly..."
//! 🎬 "One supervisor dared to manage them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module — part middle manager, part helicopter parent.
//! It builds the scroll stream, hires one source worker and one sink worker,
//! hands them opposite ends of a channel, and waits for both to clock out.
//!
//! ⚠️ DO NOT MAKE THE WORKERS PUB EVER
//! 🔒 Like Fight Club, but for async tasks. First rule: you don't pub the workers.

mod workers;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::app_config::{AppConfig, SinkConfig};
use crate::backends::{FileSink, InMemorySink, SinkBackend};
use crate::progress::ProgressMetrics;
use crate::scroll::{ScrollClient, ScrollStream};
use workers::{SinkWorker, SourceWorker, Worker};

/// 🏗️ Builds the sink the config asked for.
pub(crate) async fn build_sink(sink_config: &SinkConfig) -> Result<SinkBackend> {
    Ok(match sink_config {
        SinkConfig::File(file_config) => SinkBackend::File(
            FileSink::new(file_config.clone())
                .await
                .context("💀 Could not open the file sink")?,
        ),
        SinkConfig::Stdout => SinkBackend::File(FileSink::stdout()),
        SinkConfig::InMemory => SinkBackend::InMemory(InMemorySink::new()),
    })
}

/// 📦 The Supervisor: because even async tasks need someone hovering over them
/// asking "is it done yet?" every 5 milliseconds.
pub(crate) struct Supervisor {
    /// 🔧 The sacred scrolls of configuration, passed down from main()
    app_config: AppConfig,
}

impl Supervisor {
    pub(crate) fn new(app_config: AppConfig) -> Self {
        Self { app_config }
    }

    fn source_name(&self) -> String {
        let source = &self.app_config.source_config;
        match source.index {
            Some(ref index) => format!("{}/{}", source.url.trim_end_matches('/'), index),
            None => source.url.clone(),
        }
    }

    /// 🧵 Unleash the workers! Returns how many hits reached the sink.
    ///
    /// 💀 Any worker error fails the run. The sink's error wins when both fail,
    /// because the source only fails second-hand once the sink is gone.
    pub(crate) async fn start_workers(
        &self,
        client: Arc<dyn ScrollClient>,
        sink: SinkBackend,
    ) -> Result<u64> {
        let stream_config = &self.app_config.stream;
        let query = self
            .app_config
            .source_config
            .scroll_query()
            .context("💀 The configured query can't open a scroll")?;
        let stream = ScrollStream::builder()
            .client(client)
            .query(query)
            .retry_limit(stream_config.retry_limit)
            .retry_delay(stream_config.retry_delay())
            .low_water_mark(stream_config.low_water_mark)
            .high_water_mark(stream_config.high_water_mark)
            .build()
            .context("💀 The scroll stream refused to be assembled")?;

        let (tx, rx) = async_channel::bounded(self.app_config.runtime.queue_capacity.max(1));
        let total_rx = stream.subscribe_total();
        let progress = ProgressMetrics::new(self.source_name());

        // 📦 Assemble the team! Like the Avengers, but async
        let sink_handle = SinkWorker::new(rx, sink, progress, total_rx).start();
        let source_handle = SourceWorker::new(stream, tx).start();

        let sink_result = sink_handle.await.context("💀 SinkWorker panicked")?;
        let source_result = source_handle.await.context("💀 SourceWorker panicked")?;
        let written = sink_result?;
        let forwarded = source_result?;
        info!(
            "✅ scroll complete: {} hits forwarded, {} hits written",
            forwarded, written
        );
        Ok(written)
    }
}
