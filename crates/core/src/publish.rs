//! Request payloads accepted by the publish endpoint.
//!
//! Three shapes are accepted:
//! 1. An array of measurements: `[{...}, {...}]`
//! 2. An object wrapping an array: `{"metrics": [{...}]}`
//! 3. A single measurement object: `{...}`

use serde_json::Value;

use crate::error::{Error, Result};
use crate::limits::MAX_PUBLISH_EVENTS;

/// A decoded publish request, split into individual items.
///
/// Items stay as raw JSON so each one can be validated on its own; one bad
/// measurement does not reject the rest of the request.
#[derive(Debug, Clone)]
pub struct PublishPayload {
    pub items: Vec<Value>,
}

impl PublishPayload {
    /// Parse a request body in any of the accepted shapes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| Error::parse(format!("invalid JSON: {}", e)))?;

        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("metrics") {
                Some(Value::Array(items)) => items,
                Some(_) => return Err(Error::parse("'metrics' must be an array")),
                None => vec![Value::Object(obj)],
            },
            _ => return Err(Error::parse("body must be a measurement object or an array")),
        };

        if items.len() > MAX_PUBLISH_EVENTS {
            return Err(Error::parse(format!(
                "too many measurements: {} (max {})",
                items.len(),
                MAX_PUBLISH_EVENTS
            )));
        }

        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
