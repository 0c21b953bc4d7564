//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{ElasticsearchSourceConfig, FileSinkConfig};
use crate::scroll::{
    DEFAULT_HIGH_WATER_MARK, DEFAULT_LOW_WATER_MARK, DEFAULT_RETRY_BASE_DELAY,
    DEFAULT_RETRY_LIMIT, RetryDelay, quadratic_backoff,
};

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// 📡 Where the hits come from. Elasticsearch. It's always Elasticsearch.
    pub source_config: ElasticsearchSourceConfig,
    /// 🚰 Where the hits go. Defaults to stdout, for the pipe-it-into-jq crowd.
    #[serde(default)]
    pub sink_config: SinkConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🚰 Pick your destination.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub enum SinkConfig {
    File(FileSinkConfig),
    #[default]
    Stdout,
    InMemory,
}

/// 📜 Knobs for the scroll stream itself: retries and buffering.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    /// 🔄 Follow-up failures tolerated before the stream gives up. Must be at least 1.
    pub retry_limit: u32,
    /// ⏳ Base of the quadratic backoff: attempt² × this.
    pub retry_base_delay_ms: u64,
    /// 📉 Refill the buffer when it drops below this many hits.
    pub low_water_mark: usize,
    /// 📈 Page size and batch size. Must not be below `low_water_mark`.
    pub high_water_mark: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY.as_millis() as u64,
            low_water_mark: DEFAULT_LOW_WATER_MARK,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

impl StreamConfig {
    pub fn retry_delay(&self) -> RetryDelay {
        quadratic_backoff(Duration::from_millis(self.retry_base_delay_ms))
    }
}

/// 🧵 How the pipeline around the stream behaves.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 📬 Batches allowed to sit between the source worker and the sink worker.
    #[serde(alias = "channel_size")]
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { queue_capacity: 10 }
    }
}

/// 🚀 Load the config — from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Merges environment variables (`ESSCROLL_*`, nested with `__`, e.g.
/// `ESSCROLL_SOURCE_CONFIG__URL`) with an optional TOML file. TOML wins on conflicts.
///   - `config_file_name` is None → env vars only. No file. No assumptions.
///   - `config_file_name` is Some → env vars + TOML file, merged.
///
/// 💀 Returns an error if config is unparseable. Check the error message though —
/// it's contextual, informative, and written with love. Or despair. Hard to tell at 3am.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    // 🏗️ env vars as the base layer — like a good sourdough starter.
    let config = Figment::new().merge(Env::prefixed("ESSCROLL_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (ESSCROLL_*). \
             The file exists in our hearts, but apparently not on disk.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (ESSCROLL_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn write_test_config(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
        let temp_path = dir.path().join("esscroll.toml");
        // 🧪 Figment wants TOML from disk, like it's method acting.
        fs::write(&temp_path, contents)
            .expect("💀 Failed to write test config. The filesystem said 'new phone who dis'.");
        temp_path
    }

    #[test]
    fn the_one_where_every_knob_is_turned() {
        let dir = tempfile::tempdir().expect("💀 no temp dir for us");
        let config_path = write_test_config(
            &dir,
            r#"
            [source_config]
            url = "http://localhost:9200"
            index = "logs-*"
            scroll = "2m"
            api_key = "sekrit"
            query = { query = { term = { level = "error" } } }

            [stream]
            retry_limit = 5
            retry_base_delay_ms = 100
            low_water_mark = 200
            high_water_mark = 500

            [runtime]
            queue_capacity = 4

            [sink_config.File]
            file_name = "out.ndjson"
            "#,
        );

        let app_config = load_config(Some(config_path.as_path()))
            .expect("💀 Full config should parse. The schema drift goblin does not get this win.");

        assert_eq!(app_config.source_config.index.as_deref(), Some("logs-*"));
        assert_eq!(app_config.source_config.scroll, "2m");
        assert_eq!(
            app_config.source_config.query,
            json!({ "query": { "term": { "level": "error" } } })
        );
        assert_eq!(app_config.stream.retry_limit, 5);
        assert_eq!(app_config.stream.retry_delay()(2), Duration::from_millis(400));
        assert_eq!(app_config.stream.high_water_mark, 500);
        assert_eq!(app_config.runtime.queue_capacity, 4);
        match app_config.sink_config {
            SinkConfig::File(file_config) => assert_eq!(file_config.file_name, "out.ndjson"),
            honestly_who_knows => panic!(
                "💀 Expected File sink config, but serde took us to {:?}. Plot twist energy.",
                honestly_who_knows
            ),
        }
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() {
        let dir = tempfile::tempdir().expect("💀 no temp dir for us");
        let config_path = write_test_config(
            &dir,
            r#"
            [source_config]
            url = "http://localhost:9200"
            "#,
        );

        let app_config: AppConfig = Figment::new()
            .merge(Toml::file(config_path.as_path()))
            .extract()
            .expect("💀 Defaults should exist. Serde left us on read otherwise.");

        assert_eq!(app_config.sink_config, SinkConfig::Stdout);
        assert_eq!(app_config.stream, StreamConfig::default());
        assert_eq!(app_config.stream.retry_limit, 3);
        assert_eq!(app_config.stream.retry_delay()(1), Duration::from_millis(500));
        assert_eq!(app_config.runtime.queue_capacity, 10);
        assert_eq!(app_config.source_config.scroll, "30s");
    }

    #[test]
    fn the_one_where_the_sink_is_named_by_a_single_word() {
        let dir = tempfile::tempdir().expect("💀 no temp dir for us");
        let config_path = write_test_config(
            &dir,
            r#"
            sink_config = "InMemory"

            [source_config]
            url = "http://localhost:9200"
            "#,
        );

        let app_config = load_config(Some(config_path.as_path()))
            .expect("💀 unit sink variant should parse");
        assert_eq!(app_config.sink_config, SinkConfig::InMemory);
    }

    #[test]
    fn the_one_where_the_url_never_showed_up() {
        let dir = tempfile::tempdir().expect("💀 no temp dir for us");
        let config_path = write_test_config(&dir, "[stream]\nretry_limit = 2\n");

        let err = load_config(Some(config_path.as_path()))
            .expect_err("💀 config without a url was accepted");
        assert!(format!("{err:#}").contains("Failed to parse configuration"));
    }
}
