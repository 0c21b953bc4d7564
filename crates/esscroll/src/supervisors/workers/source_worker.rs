use anyhow::{Context, Result, bail};
use async_channel::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::Worker;
use crate::common::Hit;
use crate::scroll::{Pull, ScrollStream};

/// 📡 Pulls batches from the scroll stream and forwards them down the channel.
///
/// Returns how many hits it forwarded. Dropping `tx` on the way out is how the sink
/// worker learns the party is over.
#[derive(Debug)]
pub(crate) struct SourceWorker {
    stream: ScrollStream,
    tx: Sender<Vec<Hit>>,
}

impl SourceWorker {
    pub(crate) fn new(stream: ScrollStream, tx: Sender<Vec<Hit>>) -> Self {
        Self { stream, tx }
    }
}

impl Worker for SourceWorker {
    fn start(mut self) -> JoinHandle<Result<u64>> {
        tokio::spawn(async move {
            debug!("📤 SourceWorker started pulling...");
            let batch_size = self.stream.high_water_mark();
            let mut forwarded = 0u64;
            loop {
                let pulled = self
                    .stream
                    .pull(batch_size)
                    .await
                    .context("SourceWorker failed to pull from the scroll stream")?;
                match pulled {
                    Pull::Records(batch) => {
                        let batch_len = batch.len() as u64;
                        debug!("🪣 SourceWorker forwarding batch of {} hits", batch_len);
                        if self.tx.send(batch).await.is_err() {
                            // 💀 nobody is listening anymore. stop the scroll, stop the fetches.
                            self.stream.destroy();
                            bail!("SourceWorker lost its sink after forwarding {forwarded} hits");
                        }
                        forwarded += batch_len;
                    }
                    Pull::EndOfStream | Pull::Closed => {
                        info!("🏁 SourceWorker: scroll exhausted after {} hits", forwarded);
                        return Ok(forwarded);
                    }
                }
            }
        })
    }
}
