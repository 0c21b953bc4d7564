//! 📊 progress.rs — "Are we there yet?" — every scroll, every time, forever.
//!
//! 🚀 The cluster tells us how many hits match on the very first page. From then on we
//! can answer the question with cold hard numbers: docs delivered against docs declared,
//! a progress bar, and a table so comfy it has lumbar support.
//!
//! ⚠️  Warning: Watching this progress bar will not make it go faster.
//! Neither will refreshing it. We've tried. Science says no.
//!
//! 🦆 The duck has nothing to do with this module. It's just vibing.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

// -- 📏 one mebibyte — not a megabyte, pedants. there's a difference and I will die on this hill.
const MIB: u64 = 1024 * 1024;

/// 📦 Raw bytes → something a human can read. Because "1073741824 bytes" is a war crime in a UI.
fn format_bytes(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= 1024 {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        // -- 🐛 raw bytes mode. small scrolls need love too.
        format!("{} bytes", bytes)
    }
}

/// 🔢 "1000000 docs" → "1,000,000 docs" — you're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS or HH:MM:SS. If it shows HH:MM:SS, you should probably call your mom.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📡 A snapshot of throughput. Like a speedometer, but less likely to get you a ticket.
struct Rates {
    docs_per_sec: f64,
    mib_per_sec: f64,
}

/// 📊 Tracks docs, bytes, rates and your sanity while a scroll drains.
///
/// Rates come from a sliding 5-second window so spikes don't scare you.
///
/// # Ancient Proverb
/// "He who scrolls forty million docs without a progress bar, scrolls alone and in darkness."
pub struct ProgressMetrics {
    /// 🏷️ what are we scrolling? a name for the UI
    source_name: String,
    /// 📏 what the cluster said we'd get. None until the first page lands.
    declared_total: Option<u64>,
    total_bytes: u64,
    total_docs: u64,
    progress_bar: ProgressBar,
    /// 🔄 sliding window of (timestamp, bytes, docs)
    rate_samples: VecDeque<(Instant, u64, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ProgressMetrics")
            .field("source_name", &self.source_name)
            .field("declared_total", &self.declared_total)
            .field("total_bytes", &self.total_bytes)
            .field("total_docs", &self.total_docs)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 A progress display drawn to the terminal (stderr, so stdout stays clean NDJSON).
    pub fn new(source_name: String) -> Self {
        let progress_bar = ProgressBar::new(0);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n| [{bar:40.cyan/blue}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self::with_bar(source_name, progress_bar)
    }

    /// 🙈 Same bookkeeping, nothing drawn. For tests and for people who hate joy.
    pub fn hidden(source_name: String) -> Self {
        Self::with_bar(source_name, ProgressBar::hidden())
    }

    fn with_bar(source_name: String, progress_bar: ProgressBar) -> Self {
        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64, 0u64));
        Self {
            source_name,
            declared_total: None,
            total_bytes: 0,
            total_docs: 0,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    /// 🔢 The cluster finally told us how many docs match. The bar gets a length.
    pub fn set_declared_total(&mut self, total: u64) {
        self.declared_total = Some(total);
        self.progress_bar.set_length(total);
    }

    /// 📈 Another batch made it out the door.
    pub fn update(&mut self, bytes: u64, docs: u64) {
        self.total_bytes += bytes;
        self.total_docs += docs;

        let rates = self.calculate_rates();
        self.render(rates);
        self.progress_bar.set_position(self.total_docs);
    }

    pub fn finish(&self) {
        self.progress_bar.finish();
    }

    pub fn total_docs(&self) -> u64 {
        self.total_docs
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// 📊 Docs delivered as a share of docs declared. 0 while the total is unknown or zero.
    pub fn percent(&self) -> f64 {
        match self.declared_total {
            Some(total) if total > 0 => (self.total_docs as f64 / total as f64) * 100.0,
            _ => 0.0,
        }
    }

    fn calculate_rates(&mut self) -> Rates {
        let now = Instant::now();
        let window = Duration::from_secs(5);
        // -- 🧹 evict samples older than the window
        while let Some(&(timestamp, _, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }

        self.rate_samples
            .push_back((now, self.total_bytes, self.total_docs));

        if let Some(&(oldest_time, oldest_bytes, oldest_docs)) = self.rate_samples.front() {
            let elapsed = now.duration_since(oldest_time).as_secs_f64();
            if elapsed > 0.0 {
                let bytes_delta = self.total_bytes.saturating_sub(oldest_bytes);
                let docs_delta = self.total_docs.saturating_sub(oldest_docs);
                return Rates {
                    docs_per_sec: docs_delta as f64 / elapsed,
                    mib_per_sec: (bytes_delta as f64 / elapsed) / MIB as f64,
                };
            }
        }

        Rates {
            docs_per_sec: 0.0,
            mib_per_sec: 0.0,
        }
    }

    fn render(&self, rates: Rates) {
        let percent = self.percent();
        let elapsed = self.start_time.elapsed();
        let remaining = if percent > 0.0 {
            let total_estimated = elapsed.as_secs_f64() / (percent / 100.0);
            let remaining_secs = total_estimated - elapsed.as_secs_f64();
            if remaining_secs > 0.0 {
                format_duration(Duration::from_secs_f64(remaining_secs))
            } else {
                "--:--".to_string()
            }
        } else {
            "--:--".to_string()
        };

        let docs_progress = match self.declared_total {
            Some(total) => format!(
                "{} / {} Docs",
                format_number(self.total_docs),
                format_number(total)
            ),
            None => format!("{} / ? Docs", format_number(self.total_docs)),
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![
            Cell::new(format!("{} Docs/s", format_number(rates.docs_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(docs_progress).set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{:.2} MiB/s", rates.mib_per_sec))
                .set_alignment(CellAlignment::Right),
            Cell::new(format_bytes(self.total_bytes)).set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} elapsed", format_duration(elapsed)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}% · {} remaining", percent, remaining))
                .set_alignment(CellAlignment::Right),
        ]);

        self.progress_bar
            .set_message(format!("source: {}\n{}", self.source_name, table));
    }
}
