//! Serializable types exchanged between the client, the invoker and callers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A resource exposed by a remote machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    /// Kind tag such as `camera` or `vision`
    pub kind: String,
    /// Model triplet of the implementation, when the machine reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)?;
        if let Some(model) = &self.model {
            write!(f, " ({})", model)?;
        }
        Ok(())
    }
}

/// Reference to a resource on one open session.
///
/// Handles are only produced by [`RemoteClient::resolve`](super::client::RemoteClient::resolve)
/// and stay tied to the session that produced them. Using a handle after that
/// session closed fails with [`MachineError::NotConnected`](super::error::MachineError::NotConnected).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    descriptor: ResourceDescriptor,
    session_id: String,
}

impl ResourceHandle {
    pub(crate) fn new(descriptor: ResourceDescriptor, session_id: String) -> Self {
        Self {
            descriptor,
            session_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn kind(&self) -> &str {
        &self.descriptor.kind
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub(crate) fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Structured reply of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandResult(Map<String, Value>);

impl CommandResult {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value under `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for CommandResult {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Human-readable mapping dump: `{key: value, ...}` with JSON-encoded values.
impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// Lifecycle state of a [`RemoteClient`](super::client::RemoteClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    /// No session has been opened yet
    Unconnected,
    /// A session is open
    Open,
    /// The session was closed; terminal
    Closed,
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientStatus::Unconnected => write!(f, "unconnected"),
            ClientStatus::Open => write!(f, "open"),
            ClientStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Session metadata for an open connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub address: String,
    pub api_key_id: String,
    /// RFC3339 timestamp
    pub connected_at: String,
    /// Number of retry attempts needed to establish the connection
    pub retry_attempts: u32,
    pub resource_count: usize,
}

/// Everything the orchestrator learned during one run.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationOutcome {
    pub session: SessionInfo,
    pub resource: ResourceDescriptor,
    pub resources: Vec<ResourceDescriptor>,
    pub result: CommandResult,
}
