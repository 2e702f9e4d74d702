//! Remote machine client: one session, from connect to close.
//!
//! ## Connection Lifecycle
//!
//! 1. **Dial**: Open a [`Link`] through the configured [`Transport`], bounded by
//!    the connect timeout.
//! 2. **Snapshot**: Fetch the machine's resource list once; `list_resources` and
//!    `resolve` answer from this snapshot without further network I/O.
//! 3. **Invoke**: Commands run on the open link (see
//!    [`CommandInvoker`](super::invoker::CommandInvoker)).
//! 4. **Close**: Release the link. Closing is idempotent and terminal; on a
//!    client that never connected it does nothing.
//!
//! ```text
//! Unconnected --connect--> Open --close--> Closed
//! ```
//!
//! Every call on one client is serialized by a single-slot async lock around
//! the session state, so a client may be shared between tasks.
//!
//! ## Retry Strategy
//!
//! Dialing uses exponential backoff with jitter via the `backon` crate:
//!
//! - **Initial delay**: `ClientSettings::retry_delay` (default: 1000ms)
//! - **Maximum delay**: Capped at [`MAX_RETRY_DELAY`] (10 seconds)
//! - **Maximum attempts**: `ClientSettings::max_retries` (default: 0, no retry)
//!
//! Only `NetworkError` is retried. Rejected credentials fail immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::{ClientSettings, ConnectionConfig, MAX_RETRY_DELAY};
use super::error::{MachineError, Result};
use super::transport::{Link, Transport};
use super::types::{ClientStatus, ResourceDescriptor, ResourceHandle, SessionInfo};

struct OpenSession {
    info: SessionInfo,
    link: Box<dyn Link>,
    resources: Vec<ResourceDescriptor>,
}

enum ClientState {
    Unconnected,
    Open(OpenSession),
    Closed,
}

impl ClientState {
    fn open(&self) -> Result<&OpenSession> {
        match self {
            ClientState::Open(session) => Ok(session),
            _ => Err(MachineError::NotConnected),
        }
    }

    fn status(&self) -> ClientStatus {
        match self {
            ClientState::Unconnected => ClientStatus::Unconnected,
            ClientState::Open(_) => ClientStatus::Open,
            ClientState::Closed => ClientStatus::Closed,
        }
    }
}

/// Owns at most one session to a remote machine.
pub struct RemoteClient {
    transport: Arc<dyn Transport>,
    settings: ClientSettings,
    state: Mutex<ClientState>,
}

impl RemoteClient {
    /// Create an unconnected client.
    pub fn new(transport: Arc<dyn Transport>, settings: ClientSettings) -> Self {
        Self {
            transport,
            settings,
            state: Mutex::new(ClientState::Unconnected),
        }
    }

    /// Create a client and connect it in one step.
    pub async fn dial(
        transport: Arc<dyn Transport>,
        settings: ClientSettings,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        let client = Self::new(transport, settings);
        client.connect(config).await?;
        Ok(client)
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub async fn status(&self) -> ClientStatus {
        self.state.lock().await.status()
    }

    /// Metadata of the open session.
    pub async fn session_info(&self) -> Result<SessionInfo> {
        Ok(self.state.lock().await.open()?.info.clone())
    }

    /// Open a session to the machine described by `config`.
    ///
    /// Fails with `AlreadyConnected` on an open client and `NotConnected` on a
    /// closed one.
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<SessionInfo> {
        let mut state = self.state.lock().await;
        match &*state {
            ClientState::Open(session) => {
                return Err(MachineError::AlreadyConnected(
                    session.info.address.clone(),
                ));
            }
            ClientState::Closed => return Err(MachineError::NotConnected),
            ClientState::Unconnected => {}
        }

        info!(
            "Connecting to {} via {} transport with timeout {}s, max_retries={}, retry_delay={}ms",
            config.address(),
            self.transport.name(),
            self.settings.connect_timeout.as_secs(),
            self.settings.max_retries,
            self.settings.retry_delay.as_millis()
        );

        let (link, retry_attempts) =
            connect_with_retry(self.transport.as_ref(), config, &self.settings).await?;

        // Open before the snapshot so an interrupted connect still gets closed
        *state = ClientState::Open(OpenSession {
            info: SessionInfo {
                session_id: Uuid::new_v4().to_string(),
                address: config.address().to_string(),
                api_key_id: config.api_key_id().to_string(),
                connected_at: chrono::Utc::now().to_rfc3339(),
                retry_attempts,
                resource_count: 0,
            },
            link,
            resources: Vec::new(),
        });

        let ClientState::Open(session) = &mut *state else {
            return Err(MachineError::NotConnected);
        };

        match fetch_resources(session.link.as_ref(), config, self.settings.connect_timeout).await {
            Ok(resources) => {
                session.info.resource_count = resources.len();
                session.resources = resources;
                info!(
                    "Connected to {} (session {}, {} resources)",
                    session.info.address, session.info.session_id, session.info.resource_count
                );
                Ok(session.info.clone())
            }
            Err(e) => {
                if let Err(close_err) = session.link.close().await {
                    warn!("Error while closing failed session: {}", close_err);
                }
                *state = ClientState::Unconnected;
                Err(e)
            }
        }
    }

    /// Resources exposed by the machine when the session was opened.
    pub async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>> {
        Ok(self.state.lock().await.open()?.resources.clone())
    }

    /// Look up a resource by name, optionally checking its kind.
    pub async fn resolve(&self, name: &str, expected_kind: Option<&str>) -> Result<ResourceHandle> {
        let state = self.state.lock().await;
        let session = state.open()?;

        let descriptor = session
            .resources
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| MachineError::ResourceNotFound(name.to_string()))?;

        if let Some(expected) = expected_kind
            && descriptor.kind != expected
        {
            return Err(MachineError::KindMismatch {
                name: name.to_string(),
                expected: expected.to_string(),
                actual: descriptor.kind.clone(),
            });
        }

        debug!("Resolved {} on session {}", descriptor, session.info.session_id);
        Ok(ResourceHandle::new(
            descriptor.clone(),
            session.info.session_id.clone(),
        ))
    }

    /// Release the session. Idempotent; a no-op unless a session is open.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, ClientState::Closed) {
            ClientState::Open(session) => {
                info!(
                    "Closing session {} to {}",
                    session.info.session_id, session.info.address
                );
                if let Err(e) = session.link.close().await {
                    warn!("Error during close: {}", e);
                }
            }
            ClientState::Unconnected => {
                *state = ClientState::Unconnected;
                debug!("Closing a client that never connected");
            }
            ClientState::Closed => debug!("Client already closed"),
        }
    }

    /// Run `command` on the resource behind `handle`, bounded by `timeout`.
    pub(crate) async fn do_command(
        &self,
        handle: &ResourceHandle,
        command: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Map<String, Value>> {
        let state = self.state.lock().await;
        let session = state.open()?;

        if handle.session_id() != session.info.session_id {
            warn!(
                "Handle for {} belongs to session {}, not the open session {}",
                handle.name(),
                handle.session_id(),
                session.info.session_id
            );
            return Err(MachineError::NotConnected);
        }

        match tokio::time::timeout(timeout, session.link.do_command(handle.name(), command)).await {
            Ok(result) => result,
            Err(_) => Err(MachineError::Transport(format!(
                "command to '{}' timed out after {:?}",
                handle.name(),
                timeout
            ))),
        }
    }
}

impl Drop for RemoteClient {
    fn drop(&mut self) {
        if let ClientState::Open(session) = self.state.get_mut() {
            warn!(
                "Client for {} dropped while session {} was still open",
                session.info.address, session.info.session_id
            );
        }
    }
}

/// Dial with retry logic using exponential backoff with jitter.
///
/// Returns the link and the number of retries that were needed.
pub(crate) async fn connect_with_retry(
    transport: &dyn Transport,
    config: &ConnectionConfig,
    settings: &ClientSettings,
) -> Result<(Box<dyn Link>, u32)> {
    // Track retry attempts using atomic counter
    let attempt_counter = AtomicU32::new(0);

    let backoff = ExponentialBuilder::default()
        .with_min_delay(settings.retry_delay)
        .with_max_delay(MAX_RETRY_DELAY)
        .with_max_times(settings.max_retries as usize)
        .with_jitter();

    let result = (|| async {
        let current_attempt = attempt_counter.fetch_add(1, Ordering::SeqCst);

        if current_attempt > 0 {
            warn!(
                "Connection retry attempt {} to {}",
                current_attempt,
                config.address()
            );
        }

        dial_once(transport, config, settings.connect_timeout).await
    })
    .retry(backoff)
    .when(|e: &MachineError| {
        let retryable = e.is_retryable();
        if !retryable {
            warn!(
                "Connection to {} failed with non-retryable error: {}",
                config.address(),
                e
            );
        }
        retryable
    })
    .notify(|err: &MachineError, dur: Duration| {
        warn!("Connection failed: {}. Retrying in {:?}", err, dur);
    })
    .await;

    let total_attempts = attempt_counter.load(Ordering::SeqCst);
    let retry_count = total_attempts.saturating_sub(1);

    match result {
        Ok(link) => {
            if retry_count > 0 {
                info!(
                    "Connection to {} succeeded after {} retry attempt(s)",
                    config.address(),
                    retry_count
                );
            }
            Ok((link, retry_count))
        }
        Err(e) => {
            error!(
                "Connection to {} failed after {} attempt(s). Last error: {}",
                config.address(),
                total_attempts,
                e
            );
            Err(e)
        }
    }
}

async fn dial_once(
    transport: &dyn Transport,
    config: &ConnectionConfig,
    timeout: Duration,
) -> Result<Box<dyn Link>> {
    tokio::time::timeout(timeout, transport.dial(config))
        .await
        .map_err(|_| MachineError::Network {
            address: config.address().to_string(),
            message: format!("Connection timed out after {:?}", timeout),
        })?
}

/// Resource snapshot taken while connecting; any failure here is a network error.
async fn fetch_resources(
    link: &dyn Link,
    config: &ConnectionConfig,
    timeout: Duration,
) -> Result<Vec<ResourceDescriptor>> {
    match tokio::time::timeout(timeout, link.resources()).await {
        Ok(Ok(resources)) => Ok(resources),
        Ok(Err(MachineError::Transport(message))) => Err(MachineError::Network {
            address: config.address().to_string(),
            message,
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(MachineError::Network {
            address: config.address().to_string(),
            message: format!("Listing resources timed out after {:?}", timeout),
        }),
    }
}
