//! Command invocation against a resolved resource.
//!
//! A [`CommandInvoker`] borrows an open [`RemoteClient`] and sends a
//! [`CommandPayload`] to the resource behind a [`ResourceHandle`]. Invocations
//! are never retried: the remote side may already have applied the command.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::client::RemoteClient;
use super::error::Result;
use super::payload::CommandPayload;
use super::types::{CommandResult, ResourceHandle};

/// Sends commands through one client.
pub struct CommandInvoker<'a> {
    client: &'a RemoteClient,
    timeout: Duration,
    required: Vec<String>,
}

impl<'a> CommandInvoker<'a> {
    /// Invoker using the client's configured command timeout.
    pub fn new(client: &'a RemoteClient) -> Self {
        Self {
            client,
            timeout: client.settings().command_timeout,
            required: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject payloads lacking `key` before they leave the process.
    pub fn require(mut self, key: impl Into<String>) -> Self {
        self.required.push(key.into());
        self
    }

    /// Run `payload` on the resource behind `handle`.
    ///
    /// A rejected payload leaves the session open. A timeout or a dropped
    /// connection surfaces as `TransportError`.
    pub async fn invoke(
        &self,
        handle: &ResourceHandle,
        payload: &CommandPayload,
    ) -> Result<CommandResult> {
        payload.require(self.required.as_slice())?;

        debug!(
            "Invoking {} with keys [{}] (timeout {:?})",
            handle.descriptor(),
            payload.keys().collect::<Vec<_>>().join(", "),
            self.timeout
        );

        let start = Instant::now();
        match self
            .client
            .do_command(handle, payload.to_struct(), self.timeout)
            .await
        {
            Ok(reply) => {
                info!(
                    "Command on {} completed in {}ms",
                    handle.name(),
                    start.elapsed().as_millis()
                );
                Ok(CommandResult::from(reply))
            }
            Err(e) => {
                warn!("Command on {} failed: {}", handle.name(), e);
                Err(e)
            }
        }
    }
}
