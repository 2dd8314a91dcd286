use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What happens when `dispatch` is called while a dispatch round is
/// still running (from a reducer, an action or a subscriber callback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedDispatch {
    /// Run the nested round to completion right away, before the outer
    /// round's remaining change events.
    ///
    /// Subscribers can then observe rounds out of issue order when both
    /// rounds touch the same namespace.
    #[default]
    Immediate,
    /// Queue the nested payload and run it after the outer round has
    /// published all of its events. Queued payloads run in FIFO order.
    Queued,
}

/// Store configuration.
///
/// # Examples
///
/// ```
/// use statebox::{NestedDispatch, StoreConfig};
///
/// let config = StoreConfig::from_json(r#"{ "nested_dispatch": "queued" }"#).unwrap();
/// assert_eq!(config.nested_dispatch, NestedDispatch::Queued);
/// assert_eq!(StoreConfig::from_json("{}").unwrap(), StoreConfig::default());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Handling of dispatches issued during a dispatch round.
    pub nested_dispatch: NestedDispatch,
}

impl StoreConfig {
    /// Parse a JSON configuration object. Missing keys take their defaults.
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Configuration that queues nested dispatches.
    pub fn queued() -> Self {
        Self {
            nested_dispatch: NestedDispatch::Queued,
        }
    }
}
