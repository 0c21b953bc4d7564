//! 🚀 esscroll-cli — the front door, the bouncer, the maitre d' of esscroll.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that loads config,
//! sets up logging, and then lets the real code do the heavy lifting.
//! Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 📜 Scroll an Elasticsearch index out to NDJSON, one page at a time.
#[derive(Debug, Parser)]
#[command(name = "esscroll", version, about)]
struct Cli {
    /// 🔧 Path to the TOML config. Skipped quietly if it doesn't exist; ESSCROLL_* env vars
    /// fill in the rest.
    #[arg(default_value = "esscroll.toml")]
    config: PathBuf,
}

/// 🚀 main() — where it all begins. The genesis. The big bang.
/// The "I pressed F5 and held my breath" moment.
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 logs go to stderr. stdout belongs to the NDJSON, and the NDJSON does not share.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 🔒 Validate the config file exists before we get too emotionally attached
    let config_file = cli.config.as_path();
    let config_file_if_it_exists = match config_file.try_exists()
        .with_context(|| format!("💀 Couldn't even check whether the configuration file exists. Permissions? Cursed mount? Was checking here: '{}'", config_file.display()))?
    {
        true => Some(config_file),
        false => None, // 💤 Not there. Env vars it is.
    };

    let app_config = esscroll::app_config::load_config(config_file_if_it_exists)
        .context("💀 In esscroll-cli, main, we couldn't load the config. Make sure the file is valid TOML, or that ESSCROLL_SOURCE_CONFIG__URL is set if you're going file-less")?;

    // 🚀 SEND IT. No take-backs.
    match esscroll::run(app_config).await {
        Ok(written) => {
            info!("✅ {} hits written. Pop the champagne. 🍾", written);
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one tear-jerking layer at a time
            let mut the_vibes_are_giving_connection_issues = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                let cause_str = cause.to_string();
                if cause_str.contains("error sending request")
                    || cause_str.contains("connection refused")
                    || cause_str.contains("Connection refused")
                    || cause_str.contains("tcp connect error")
                    || cause_str.contains("dns error")
                    || cause_str.contains("never made it to Elasticsearch")
                {
                    the_vibes_are_giving_connection_issues = true;
                }
            }

            if the_vibes_are_giving_connection_issues {
                error!(
                    "🔧 hint: looks like Elasticsearch isn't reachable. \
                    Double-check the url in source_config and that the cluster is actually running. \
                    If you're using Docker, try `docker ps` to see what's up, or \
                    `docker compose up -d` to resurrect it. Even clusters need a nudge sometimes. ☕"
                );
            }

            // 🗑️ Exit with prejudice. Process exitus maximus.
            std::process::exit(1);
        }
    }
}
