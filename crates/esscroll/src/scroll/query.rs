//! 🔍 ScrollQuery — the opening line of every scroll conversation.
//!
//! Whatever the service wants to hear goes in `body`. We don't read it, we don't
//! validate it, we don't have opinions about your `bool` queries. The one thing
//! we insist on is the scroll lifetime, because without it there is no cursor,
//! and without a cursor this whole crate is just a very elaborate `GET`. 🦆

use serde_json::{Map, Value};

use crate::error::ScrollError;

/// 📜 The initiating request. Immutable once handed to a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollQuery {
    index: Option<String>,
    scroll: String,
    body: Value,
}

impl ScrollQuery {
    /// 🏗️ Build a query from its parts.
    ///
    /// # Errors
    /// 💀 `Configuration` when `scroll` is blank. A cursor without a lifetime is a
    /// cursor that expires immediately, and we'd rather find out now.
    pub fn new(
        index: Option<String>,
        body: Value,
        scroll: impl Into<String>,
    ) -> Result<Self, ScrollError> {
        let scroll = scroll.into();
        if scroll.trim().is_empty() {
            return Err(ScrollError::configuration(
                "query must carry a scroll lifetime (e.g. \"30s\")",
            ));
        }
        Ok(Self {
            index,
            scroll,
            body,
        })
    }

    /// 🏗️ Build a query from a single request object: `{"index": .., "scroll": .., "body": ..}`.
    ///
    /// `index` and `body` are optional, `scroll` is not.
    ///
    /// # Errors
    /// 💀 `Configuration` when the value is not an object, `scroll` is missing or not a
    /// string, or `index` is present but not a string.
    pub fn from_request(request: Value) -> Result<Self, ScrollError> {
        let Value::Object(mut request) = request else {
            return Err(ScrollError::configuration(
                "query must be a scroll initiation request object",
            ));
        };

        let scroll = match request.remove("scroll") {
            Some(Value::String(scroll)) => scroll,
            Some(other) => {
                return Err(ScrollError::configuration(format!(
                    "query scroll lifetime must be a string, got {other}"
                )));
            }
            None => {
                return Err(ScrollError::configuration(
                    "query must carry a scroll lifetime (e.g. \"30s\")",
                ));
            }
        };

        let index = match request.remove("index") {
            Some(Value::String(index)) => Some(index),
            None | Some(Value::Null) => None,
            Some(other) => {
                return Err(ScrollError::configuration(format!(
                    "query index must be a string, got {other}"
                )));
            }
        };

        let body = request
            .remove("body")
            .unwrap_or_else(|| Value::Object(Map::new()));
        Self::new(index, body, scroll)
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// ⏳ The scroll lifetime, re-sent with every follow-up request.
    pub fn scroll(&self) -> &str {
        &self.scroll
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// 📦 Fill in the page `size` if the body left it to us.
    ///
    /// Only object bodies are touched. An explicit `size` always wins.
    pub(crate) fn with_default_page_size(mut self, size: usize) -> Self {
        if let Value::Object(body) = &mut self.body {
            body.entry("size").or_insert_with(|| Value::from(size));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn the_one_where_no_scroll_means_no_stream() {
        let err = ScrollQuery::from_request(json!({ "index": "logs", "body": {} }))
            .expect_err("💀 a scrollless query slipped through");
        assert!(err.is_configuration());

        let err = ScrollQuery::new(None, json!({}), "  ").expect_err("💀 blank scroll accepted");
        assert!(err.is_configuration());
    }

    #[test]
    fn the_one_where_the_request_object_is_unpacked() {
        let query = ScrollQuery::from_request(json!({
            "index": "test-index",
            "scroll": "30s",
            "body": { "query": { "match_all": {} } }
        }))
        .expect("💀 perfectly good request rejected");

        assert_eq!(query.index(), Some("test-index"));
        assert_eq!(query.scroll(), "30s");
        assert_eq!(query.body(), &json!({ "query": { "match_all": {} } }));
    }

    #[test]
    fn the_one_where_a_numeric_scroll_is_not_a_lifetime() {
        let err = ScrollQuery::from_request(json!({ "scroll": 30 }))
            .expect_err("💀 numeric scroll accepted");
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn the_one_where_explicit_size_beats_the_default() {
        let defaulted = ScrollQuery::new(None, json!({}), "1m")
            .expect("💀 valid query rejected")
            .with_default_page_size(1000);
        assert_eq!(defaulted.body()["size"], json!(1000));

        let explicit = ScrollQuery::new(None, json!({ "size": 750 }), "1m")
            .expect("💀 valid query rejected")
            .with_default_page_size(1000);
        assert_eq!(explicit.body()["size"], json!(750));
    }
}
