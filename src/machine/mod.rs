//! Remote machine client for switching an objectfilter camera's vision service.
//!
//! This module is organized into the following submodules:
//!
//! - `config`: Connection settings with environment variable fallback
//! - `error`: Error taxonomy, exit codes and dial failure classification
//! - `types`: Resource descriptors, handles, command results and session metadata
//! - `payload`: Validated command payloads
//! - `transport`: Transport/link traits and the simulated machines
//! - `client`: Session lifecycle, connect retry and resource resolution
//! - `invoker`: Command invocation with pre-flight validation
//! - `orchestrator`: Connect, resolve, invoke and close in one scoped run

pub(crate) mod client;
pub mod config;
pub mod error;
pub(crate) mod invoker;
pub mod orchestrator;
pub mod payload;
pub mod transport;
pub mod types;

pub use client::RemoteClient;
pub use config::{ClientSettings, ConnectionConfig, Locator};
pub use error::{MachineError, Result};
pub use invoker::CommandInvoker;
pub use orchestrator::Orchestrator;
pub use payload::{CommandPayload, PayloadBuilder, SetVisionService};
pub use types::{
    ClientStatus, CommandResult, InvocationOutcome, ResourceDescriptor, ResourceHandle,
    SessionInfo,
};
