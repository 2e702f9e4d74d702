//! End-to-end flow: connect, resolve, invoke, report, close.
//!
//! Every run owns a fresh [`RemoteClient`]. Whatever happens in between,
//! including cancellation through the orchestrator's [`CancellationToken`],
//! the session is closed before the outcome is returned.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::client::RemoteClient;
use super::config::{ClientSettings, ConnectionConfig};
use super::error::{MachineError, Result};
use super::invoker::CommandInvoker;
use super::payload::{CommandPayload, SetVisionService};
use super::transport::Transport;
use super::types::{InvocationOutcome, ResourceDescriptor, SessionInfo};

/// Default resource switched by [`Orchestrator::run`].
pub const DEFAULT_RESOURCE: &str = "objectfilter";

/// Default kind the resource must have.
pub const DEFAULT_KIND: &str = "camera";

pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    settings: ClientSettings,
    resource: String,
    kind: String,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn Transport>, settings: ClientSettings) -> Self {
        Self {
            transport,
            settings,
            resource: DEFAULT_RESOURCE.to_string(),
            kind: DEFAULT_KIND.to_string(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Share an externally owned token, e.g. one tripped by Ctrl-C.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Point the configured resource at `vision_service`.
    pub async fn run(
        &self,
        config: &ConnectionConfig,
        vision_service: &str,
    ) -> Result<InvocationOutcome> {
        // Build the payload before touching the network
        let command = SetVisionService::new(vision_service)?;
        info!(
            "Requesting vision service {} on {}",
            command.name(),
            self.resource
        );
        let payload = command.into_payload()?;

        let client = RemoteClient::new(Arc::clone(&self.transport), self.settings);
        let outcome = self
            .scoped(&client, self.switch(&client, config, &payload))
            .await;

        match &outcome {
            Ok(outcome) => info!(
                "Switched {} to vision service {}",
                outcome.resource, vision_service
            ),
            Err(e) => error!("Run against {} failed: {}", config.address(), e),
        }
        outcome
    }

    /// Connect, snapshot the machine's resources and close again.
    pub async fn list_resources(
        &self,
        config: &ConnectionConfig,
    ) -> Result<(SessionInfo, Vec<ResourceDescriptor>)> {
        let client = RemoteClient::new(Arc::clone(&self.transport), self.settings);
        self.scoped(&client, async {
            let session = client.connect(config).await?;
            let resources = client.list_resources().await?;
            Ok::<_, MachineError>((session, resources))
        })
        .await
    }

    async fn switch(
        &self,
        client: &RemoteClient,
        config: &ConnectionConfig,
        payload: &CommandPayload,
    ) -> Result<InvocationOutcome> {
        let session = client.connect(config).await?;
        let resources = client.list_resources().await?;
        let handle = client.resolve(&self.resource, Some(self.kind.as_str())).await?;

        let result = CommandInvoker::new(client)
            .require(SetVisionService::KEY)
            .invoke(&handle, payload)
            .await?;

        Ok(InvocationOutcome {
            session,
            resource: handle.descriptor().clone(),
            resources,
            result,
        })
    }

    /// Drive `work` until it finishes or the token fires, then close `client`.
    async fn scoped<T>(
        &self,
        client: &RemoteClient,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!("Cancellation requested, closing session");
                Err(MachineError::Cancelled)
            }
            result = work => result,
        };

        client.close().await;
        outcome
    }
}
