//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The disk was quiet. Too quiet. A scroll had been running for an hour and every hit
//! it produced needed somewhere to land. Simple, they said. One line per hit, they said.
//!
//! This module writes hits as NDJSON: one raw document per line, exactly the bytes the
//! service sent, in exactly the order the stream delivered them. To a file, or to
//! stdout for the pipe-it-into-jq crowd.
//!
//! 💀 Disk full → your problem now
//! 🦆 (mandatory, no notes)

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::backends::Sink;
use crate::common::Hit;

// 🚰 FileSinkConfig — lives next to its FileSink bestie. One backend = one config = one file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FileSinkConfig {
    pub file_name: String,
}

/// 🚰 FileSink — NDJSON out, one hit per line.
///
/// ⚠️ `File::create` truncates if the file exists. No warning. No backup. Just gone.
pub struct FileSink {
    target: String,
    out: io::BufWriter<Box<dyn AsyncWrite + Unpin + Send>>,
    lines_written: u64,
}

// 🎭 manual Debug because a boxed writer has no idea how to describe itself
impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("target", &self.target)
            .field("lines_written", &self.lines_written)
            .finish_non_exhaustive()
    }
}

impl FileSink {
    /// 🚀 Creates (or obliterates and recreates) the output file.
    pub async fn new(sink_config: FileSinkConfig) -> Result<Self> {
        let file_handle = File::create(&sink_config.file_name).await.with_context(|| {
            format!(
                "💀 The sink file '{}' could not be conjured into existence. \
                 We stared at the path. The path stared back. \
                 One of us was wrong about whether the parent directory existed.",
                sink_config.file_name
            )
        })?;
        Ok(Self::from_writer(sink_config.file_name, Box::new(file_handle)))
    }

    /// 📺 NDJSON straight to stdout.
    pub fn stdout() -> Self {
        Self::from_writer("<stdout>".to_string(), Box::new(io::stdout()))
    }

    fn from_writer(target: String, writer: Box<dyn AsyncWrite + Unpin + Send>) -> Self {
        // 📦 BufWriter: because one syscall per document is a war crime.
        Self {
            target,
            out: io::BufWriter::new(writer),
            lines_written: 0,
        }
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn receive(&mut self, batch: Vec<Hit>) -> Result<()> {
        trace!("📬 {} hits walked into the file sink", batch.len());
        for hit in &batch {
            self.out.write_all(hit.as_str().as_bytes()).await?;
            self.out.write_all(b"\n").await?;
        }
        self.lines_written += batch.len() as u64;
        Ok(())
    }

    /// 🗑️ Flush the BufWriter. async Drop isn't a thing, so this is the only goodbye we get.
    async fn close(&mut self) -> Result<()> {
        trace!("🎬 final flush of {} lines to {}", self.lines_written, self.target);
        self.out.flush().await.with_context(|| {
            format!(
                "💀 Error flushing '{}' — the bytes could SEE the disk. They never made it.",
                self.target
            )
        })
    }
}
