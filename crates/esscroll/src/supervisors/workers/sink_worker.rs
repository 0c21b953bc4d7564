use anyhow::{Context, Result};
use async_channel::Receiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Worker;
use crate::backends::{Sink, SinkBackend};
use crate::common::Hit;
use crate::progress::ProgressMetrics;

/// 🚰 Drains the channel into a sink and keeps the progress display honest.
///
/// Returns how many hits it wrote.
#[derive(Debug)]
pub(crate) struct SinkWorker {
    rx: Receiver<Vec<Hit>>,
    sink: SinkBackend,
    progress: ProgressMetrics,
    total_rx: watch::Receiver<Option<u64>>,
}

impl SinkWorker {
    pub(crate) fn new(
        rx: Receiver<Vec<Hit>>,
        sink: SinkBackend,
        progress: ProgressMetrics,
        total_rx: watch::Receiver<Option<u64>>,
    ) -> Self {
        Self {
            rx,
            sink,
            progress,
            total_rx,
        }
    }

    /// 🔢 The total shows up with the first page, which always beats the first batch here.
    fn observe_total(&mut self) {
        if self.total_rx.has_changed().unwrap_or(false) {
            if let Some(total) = *self.total_rx.borrow_and_update() {
                self.progress.set_declared_total(total);
            }
        }
    }
}

impl Worker for SinkWorker {
    fn start(mut self) -> JoinHandle<Result<u64>> {
        tokio::spawn(async move {
            debug!("📥 SinkWorker started draining channel...");
            loop {
                match self.rx.recv().await {
                    Ok(batch) => {
                        debug!("🪣 SinkWorker received batch of {} hits", batch.len());
                        self.observe_total();
                        let docs = batch.len() as u64;
                        let bytes = batch.iter().map(|hit| hit.len_bytes() as u64 + 1).sum();
                        if let Err(err) = self.sink.receive(batch).await {
                            // 🧹 whatever the sink already accepted still gets flushed on the way out
                            if let Err(close_err) = self.sink.close().await {
                                warn!("⚠️ SinkWorker could not close sink after a failed batch: {close_err:#}");
                            }
                            self.progress.finish();
                            return Err(err.context("SinkWorker failed to receive batch"));
                        }
                        self.progress.update(bytes, docs);
                    }
                    Err(_) => {
                        debug!("🏁 SinkWorker: Channel closed. Shutting down.");
                        self.sink
                            .close()
                            .await
                            .context("SinkWorker failed to close sink")?;
                        self.progress.finish();
                        return Ok(self.progress.total_docs());
                    }
                }
            }
        })
    }
}
