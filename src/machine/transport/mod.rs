//! Transport abstraction between the machine client and a remote platform.
//!
//! The client never talks to a vendor SDK directly. It dials through a
//! [`Transport`] and drives the resulting [`Link`]:
//!
//! - [`Transport::dial`] authenticates and opens one session
//! - [`Link::resources`] enumerates what the machine exposes
//! - [`Link::do_command`] runs a resource's generic command entry point
//! - [`Link::close`] releases the session
//!
//! # Available Transports
//!
//! - [`SimTransport`]: in-process simulated machines addressed as `sim://<host>`

mod objectfilter;
mod sim;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::config::ConnectionConfig;
use super::error::Result;
use super::types::ResourceDescriptor;

pub use objectfilter::{ObjectFilterComponent, ObjectFilterConfig};
pub use sim::{CommandHandler, SimFault, SimMachine, SimTransport};

/// Opens sessions to remote machines.
///
/// Implementations must be thread-safe (`Send + Sync`) so a client can be
/// shared across tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Authenticate and open a session to the machine named by `config`.
    ///
    /// Rejected credentials must surface as `AuthError`, an unreachable
    /// machine as `NetworkError`. Transports that only receive opaque
    /// messages can use [`MachineError::from_dial_failure`](super::error::MachineError::from_dial_failure).
    async fn dial(&self, config: &ConnectionConfig) -> Result<Box<dyn Link>>;

    /// Get the name of this transport.
    ///
    /// Used for logging and debugging purposes.
    fn name(&self) -> &'static str;
}

/// One open session to a remote machine.
#[async_trait]
pub trait Link: Send + Sync {
    /// Resources currently exposed by the machine.
    async fn resources(&self) -> Result<Vec<ResourceDescriptor>>;

    /// Send `command` to the resource called `resource` and await its reply.
    async fn do_command(
        &self,
        resource: &str,
        command: Map<String, Value>,
    ) -> Result<Map<String, Value>>;

    /// Release the session. Called at most once by the client.
    async fn close(&self) -> Result<()>;
}
