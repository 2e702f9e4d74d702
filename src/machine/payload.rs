//! Validated command payloads.
//!
//! A [`CommandPayload`] is a flat mapping from non-empty string keys to
//! primitive JSON values (string, number, boolean). Typed commands such as
//! [`SetVisionService`] build one through [`PayloadBuilder`], so malformed
//! payloads are caught before anything is sent over the wire.

use serde::Serialize;
use serde_json::{Map, Value};

use super::error::{MachineError, Result};

/// Validated command body for a resource's `do_command` entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CommandPayload(Map<String, Value>);

impl CommandPayload {
    pub fn builder() -> PayloadBuilder {
        PayloadBuilder::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fail with `InvalidPayload` unless every key in `required` is present.
    pub fn require<S: AsRef<str>>(&self, required: &[S]) -> Result<()> {
        let missing: Vec<&str> = required
            .iter()
            .map(AsRef::as_ref)
            .filter(|key| !self.0.contains_key(*key))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MachineError::InvalidPayload(format!(
                "missing required key(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// The wire form handed to a transport.
    pub(crate) fn to_struct(&self) -> Map<String, Value> {
        self.0.clone()
    }
}

impl TryFrom<Map<String, Value>> for CommandPayload {
    type Error = MachineError;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        map.into_iter()
            .fold(PayloadBuilder::default(), |builder, (key, value)| {
                builder.insert(key, value)
            })
            .build()
    }
}

/// Builder that records the first validation failure and reports it on `build`.
#[derive(Debug, Default)]
pub struct PayloadBuilder {
    entries: Map<String, Value>,
    error: Option<String>,
}

impl PayloadBuilder {
    pub fn insert(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if self.error.is_some() {
            return self;
        }

        let key = key.into();
        let value = value.into();

        if key.is_empty() {
            self.error = Some("payload keys must not be empty".to_string());
        } else if !is_primitive(&value) {
            self.error = Some(format!(
                "value for '{}' must be a string, number or boolean",
                key
            ));
        } else {
            self.entries.insert(key, value);
        }
        self
    }

    pub fn build(self) -> Result<CommandPayload> {
        if let Some(error) = self.error {
            return Err(MachineError::InvalidPayload(error));
        }
        if self.entries.is_empty() {
            return Err(MachineError::InvalidPayload(
                "payload is empty".to_string(),
            ));
        }
        Ok(CommandPayload(self.entries))
    }
}

fn is_primitive(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Command that points an objectfilter camera at another vision service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetVisionService {
    name: String,
}

impl SetVisionService {
    /// Payload key understood by the objectfilter component.
    pub const KEY: &'static str = "vision-service";

    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MachineError::InvalidPayload(
                "vision service name is empty".to_string(),
            ));
        }
        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_payload(self) -> Result<CommandPayload> {
        CommandPayload::builder().insert(Self::KEY, self.name).build()
    }
}
