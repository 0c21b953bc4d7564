//! 💀 ScrollError — the many ways a scroll can end badly.
//!
//! The rest of the crate speaks `anyhow`, because most failures only need to be
//! read by a human at 3am. These are the ones a caller may want to `match` on:
//! bad construction, a service that forgot its own protocol, and fetches that
//! failed for good. Everything else rides along as a boxed `source`.

use thiserror::Error;

/// 📦 A boxed error from whatever transport the client speaks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ScrollError {
    /// 🔧 Caught at construction, before a single byte hits the network.
    #[error("💀 scroll stream misconfigured: {message}")]
    Configuration { message: String },

    /// 📡 The service answered, but not in a shape we can continue from.
    #[error("💀 scroll protocol violated: {message}")]
    Protocol { message: String },

    /// 🔁 A follow-up page kept failing until we ran out of attempts.
    #[error("💀 scroll page fetch failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: BoxError,
    },

    /// 🚪 The very first request failed. No cursor, nothing to resume.
    #[error("💀 initial scroll request failed: {source}")]
    InitialFetch {
        #[source]
        source: BoxError,
    },

    /// 🪦 A fetcher that already failed was asked for another page.
    #[error("💀 scroll already failed and cannot be resumed")]
    AlreadyFailed,

    /// 🧵 The background fetch task panicked or was torn down underneath us.
    #[error("💀 scroll fetch task died: {source}")]
    FetchTask {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl ScrollError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// ✅ True for failures that can only happen before the stream starts.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_source_chain_survives_the_boxing() {
        let err = ScrollError::RetriesExhausted {
            attempts: 3,
            source: anyhow::anyhow!("connection reset by peer").into(),
        };
        assert!(err.to_string().contains("after 3 attempt(s)"));
        let source = std::error::Error::source(&err).expect("💀 source went missing");
        assert_eq!(source.to_string(), "connection reset by peer");
    }

    #[test]
    fn the_one_where_only_configuration_is_configuration() {
        assert!(ScrollError::configuration("no client").is_configuration());
        assert!(!ScrollError::protocol("no cursor").is_configuration());
    }
}
