//! 📦 Common data structures — the building blocks of esscroll
//!
//! 🎬 COLD OPEN — INT. DATA CENTER — 3:47 AM
//!
//! A scroll cursor has been alive for twenty-nine seconds. It has one second
//! left to live. Somewhere, a `Hit` is being carried across the wire like a
//! sealed envelope. Nobody opens it. Nobody is allowed to open it.
//! That is the whole point of this module. 🦆

use serde::Serialize;
use serde_json::value::RawValue;

/// 🎯 A singular `Hit` — one document, one destiny, zero inspection.
///
/// The core relays hits, it never reads them. The payload is kept as raw JSON
/// straight from the response body, so nothing downstream pays for a parse it
/// didn't ask for. Order is the only thing the pipeline promises about a hit.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Hit {
    raw: Box<RawValue>,
}

impl Hit {
    /// 🏗️ Wrap an already-validated raw JSON value.
    pub fn from_raw(raw: Box<RawValue>) -> Self {
        Self { raw }
    }

    /// 🏗️ Build a hit from a JSON string.
    ///
    /// # Errors
    /// 💀 Returns an error when the string is not valid JSON. We don't judge the contents,
    /// but we do insist they are at least JSON-shaped.
    pub fn from_json(json: impl Into<String>) -> anyhow::Result<Self> {
        let raw = RawValue::from_string(json.into())?;
        Ok(Self { raw })
    }

    /// 📜 The raw JSON text, exactly as the service sent it.
    pub fn as_str(&self) -> &str {
        self.raw.get()
    }

    /// 📊 Byte length of the raw payload — for progress, not for judgement.
    pub fn len_bytes(&self) -> usize {
        self.raw.get().len()
    }
}

impl PartialEq for Hit {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Hit {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_hit_keeps_its_bytes_exactly_as_sent() {
        // 🧪 whitespace and key order survive, because we never parsed it into a Value
        let hit = Hit::from_json(r#"{"b": 2,  "a":1}"#).expect("💀 valid json got rejected");
        assert_eq!(hit.as_str(), r#"{"b": 2,  "a":1}"#);
        assert_eq!(hit.len_bytes(), 16);
    }

    #[test]
    fn the_one_where_garbage_is_not_json_and_we_say_so() {
        assert!(Hit::from_json("{not json").is_err());
    }

    #[test]
    fn the_one_where_a_hit_serializes_as_itself() {
        let hit = Hit::from_json(r#"{"_id":"1"}"#).expect("💀 valid json got rejected");
        let line = serde_json::to_string(&hit).expect("💀 serialize failed");
        assert_eq!(line, r#"{"_id":"1"}"#);
    }
}
