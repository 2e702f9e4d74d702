//! In-process simulated machines addressed as `sim://<host>`.
//!
//! A [`SimTransport`] keeps a registry of [`SimMachine`]s keyed by host name.
//! Each machine exposes a fixed resource list, optionally checks credentials,
//! and can inject one [`SimFault`] to exercise failure paths. Machines count
//! the links they currently have open so callers can verify sessions are
//! released.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::machine::config::ConnectionConfig;
use crate::machine::error::{MachineError, Result};
use crate::machine::types::ResourceDescriptor;

use super::objectfilter::{OBJECTFILTER_MODEL, ObjectFilterComponent, ObjectFilterConfig};
use super::{Link, Transport};

/// Scheme served by [`SimTransport`].
pub const SIM_SCHEME: &str = "sim";

/// gRPC status code reported for a missing resource.
const CODE_NOT_FOUND: i32 = 5;

/// gRPC status code reported when a resource has no command support.
const CODE_UNIMPLEMENTED: i32 = 12;

/// Remote-side implementation of a resource's `do_command`.
pub trait CommandHandler: Send + Sync {
    fn handle(&self, command: &Map<String, Value>) -> Result<Map<String, Value>>;
}

/// Failure injected by a simulated machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    /// Every dial fails with a refused connection
    Unreachable,
    /// The first `n` dials fail with a refused connection
    UnreachableFor(u32),
    /// Every credential is rejected
    RejectCredentials,
    /// Dials are never answered
    StallOnDial,
    /// Dials succeed but the resource listing is never answered
    StallOnResources,
    /// The connection drops while a command is in flight
    DropOnCommand,
    /// Commands are never answered
    StallOnCommand,
}

struct SimResource {
    descriptor: ResourceDescriptor,
    handler: Option<Arc<dyn CommandHandler>>,
}

/// A simulated remote machine.
#[derive(Default)]
pub struct SimMachine {
    resources: Vec<SimResource>,
    api_key: Option<(String, String)>,
    fault: Option<SimFault>,
    open_links: AtomicUsize,
    dial_attempts: AtomicU32,
}

impl SimMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a resource without command support.
    pub fn with_resource(mut self, descriptor: ResourceDescriptor) -> Self {
        self.resources.push(SimResource {
            descriptor,
            handler: None,
        });
        self
    }

    /// Expose a resource whose commands are served by `handler`.
    pub fn with_component(
        mut self,
        descriptor: ResourceDescriptor,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        self.resources.push(SimResource {
            descriptor,
            handler: Some(handler),
        });
        self
    }

    /// Only accept this API key id / key pair. Without it any credentials pass.
    pub fn with_api_key(mut self, api_key_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.api_key = Some((api_key_id.into(), api_key.into()));
        self
    }

    pub fn with_fault(mut self, fault: SimFault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// The layout used by the CLI demo hosts: an objectfilter camera fed by a
    /// webcam and switching between two detectors.
    pub fn objectfilter_demo() -> Result<Self> {
        let objectfilter = ObjectFilterComponent::new(ObjectFilterConfig {
            camera: "webcam".to_string(),
            vision_services: vec!["detector-1".to_string(), "detector-2".to_string()],
            labels: vec!["person".to_string()],
            confidence: 0.5,
            display_boxes: true,
            filter_data: false,
        })?;

        Ok(Self::new()
            .with_component(
                ResourceDescriptor::new("objectfilter", "camera").with_model(OBJECTFILTER_MODEL),
                Arc::new(objectfilter),
            )
            .with_resource(ResourceDescriptor::new("webcam", "camera").with_model("rdk:builtin:webcam"))
            .with_resource(
                ResourceDescriptor::new("detector-1", "vision").with_model("viam:vision:mlmodel"),
            )
            .with_resource(
                ResourceDescriptor::new("detector-2", "vision").with_model("viam:vision:mlmodel"),
            ))
    }

    /// Links dialed and not yet closed.
    pub fn open_links(&self) -> usize {
        self.open_links.load(Ordering::SeqCst)
    }

    /// Dial attempts received, successful or not.
    pub fn dial_attempts(&self) -> u32 {
        self.dial_attempts.load(Ordering::SeqCst)
    }

    async fn dial(self: Arc<Self>, config: &ConnectionConfig) -> Result<Box<dyn Link>> {
        let attempt = self.dial_attempts.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        match self.fault {
            Some(SimFault::Unreachable) => {
                return Err(MachineError::from_dial_failure(
                    config.address(),
                    "connection refused",
                ));
            }
            Some(SimFault::UnreachableFor(n)) if attempt < n => {
                return Err(MachineError::from_dial_failure(
                    config.address(),
                    "connection refused",
                ));
            }
            Some(SimFault::RejectCredentials) => {
                return Err(MachineError::from_dial_failure(
                    config.address(),
                    "permission denied: api key rejected",
                ));
            }
            Some(SimFault::StallOnDial) => return std::future::pending().await,
            _ => {}
        }

        if let Some((id, key)) = &self.api_key
            && (id != config.api_key_id() || key != config.api_key())
        {
            return Err(MachineError::from_dial_failure(
                config.address(),
                format!("invalid api key for id '{}'", config.api_key_id()),
            ));
        }

        self.open_links.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimLink {
            machine: self,
            closed: AtomicBool::new(false),
        }))
    }
}

struct SimLink {
    machine: Arc<SimMachine>,
    closed: AtomicBool,
}

impl SimLink {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(MachineError::Transport("link is closed".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Link for SimLink {
    async fn resources(&self) -> Result<Vec<ResourceDescriptor>> {
        self.ensure_open()?;
        if self.machine.fault == Some(SimFault::StallOnResources) {
            return std::future::pending().await;
        }
        Ok(self
            .machine
            .resources
            .iter()
            .map(|r| r.descriptor.clone())
            .collect())
    }

    async fn do_command(
        &self,
        resource: &str,
        command: Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        self.ensure_open()?;
        tokio::task::yield_now().await;

        match self.machine.fault {
            Some(SimFault::DropOnCommand) => {
                return Err(MachineError::Transport(
                    "connection reset by peer".to_string(),
                ));
            }
            Some(SimFault::StallOnCommand) => {
                return std::future::pending().await;
            }
            _ => {}
        }

        let target = self
            .machine
            .resources
            .iter()
            .find(|r| r.descriptor.name == resource)
            .ok_or_else(|| MachineError::RemoteExecution {
                code: Some(CODE_NOT_FOUND),
                message: format!("resource \"{}\" not found", resource),
            })?;

        match &target.handler {
            Some(handler) => {
                debug!("Dispatching command to {}", target.descriptor);
                handler.handle(&command)
            }
            None => Err(MachineError::RemoteExecution {
                code: Some(CODE_UNIMPLEMENTED),
                message: format!("DoCommand unimplemented for {}", target.descriptor),
            }),
        }
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.machine.open_links.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Transport dialing simulated machines by host name.
#[derive(Default)]
pub struct SimTransport {
    machines: DashMap<String, Arc<SimMachine>>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hosts served by the CLI: `ok`, `locked`, `unreachable`, `flaky`, `slow`.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new()
            .with_machine("ok", SimMachine::objectfilter_demo()?)
            .with_machine(
                "locked",
                SimMachine::objectfilter_demo()?.with_fault(SimFault::RejectCredentials),
            )
            .with_machine(
                "unreachable",
                SimMachine::new().with_fault(SimFault::Unreachable),
            )
            .with_machine(
                "flaky",
                SimMachine::objectfilter_demo()?.with_fault(SimFault::DropOnCommand),
            )
            .with_machine(
                "slow",
                SimMachine::objectfilter_demo()?.with_fault(SimFault::StallOnCommand),
            ))
    }

    pub fn with_machine(self, host: impl Into<String>, machine: SimMachine) -> Self {
        self.machines.insert(host.into(), Arc::new(machine));
        self
    }

    /// Shared reference to the machine registered under `host`.
    pub fn machine(&self, host: &str) -> Option<Arc<SimMachine>> {
        self.machines.get(host).map(|entry| Arc::clone(entry.value()))
    }
}

#[async_trait]
impl Transport for SimTransport {
    async fn dial(&self, config: &ConnectionConfig) -> Result<Box<dyn Link>> {
        let locator = config.locator();
        if locator.scheme() != Some(SIM_SCHEME) {
            return Err(MachineError::from_dial_failure(
                config.address(),
                format!(
                    "no route to host: the {} transport only dials {}:// addresses",
                    self.name(),
                    SIM_SCHEME
                ),
            ));
        }

        let machine = self.machine(locator.host()).ok_or_else(|| {
            MachineError::from_dial_failure(config.address(), "no route to host")
        })?;

        machine.dial(config).await
    }

    fn name(&self) -> &'static str {
        "sim"
    }
}
