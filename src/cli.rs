//! Pieces shared by the command-line binaries: connection flags, logging
//! setup, the runtime that drives a run, and output rendering.

use std::future::Future;
use std::process::ExitCode;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::machine::config::{VISION_SERVICE_ENV_VAR, resolve_required};
use crate::machine::{
    ClientSettings, ConnectionConfig, InvocationOutcome, MachineError, ResourceDescriptor, Result,
};

/// Connection flags. Each one falls back to its environment variable.
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// Machine address, e.g. sim://ok [env: MACHINE_ADDRESS]
    #[arg(long, value_name = "ADDRESS")]
    pub address: Option<String>,

    /// API key [env: MACHINE_API_KEY]
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// API key id [env: MACHINE_API_KEY_ID]
    #[arg(long, value_name = "ID")]
    pub api_key_id: Option<String>,

    /// Connect timeout in seconds [env: MACHINE_CONNECT_TIMEOUT, default: 30]
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Command timeout in seconds [env: MACHINE_COMMAND_TIMEOUT, default: 60]
    #[arg(long, value_name = "SECS")]
    pub command_timeout: Option<u64>,

    /// Connect retries on network errors [env: MACHINE_MAX_RETRIES, default: 0]
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Initial retry delay in milliseconds [env: MACHINE_RETRY_DELAY_MS, default: 1000]
    #[arg(long, value_name = "MS")]
    pub retry_delay_ms: Option<u64>,
}

impl ConnectionArgs {
    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        ConnectionConfig::resolve(
            self.address.clone(),
            self.api_key.clone(),
            self.api_key_id.clone(),
        )
    }

    pub fn settings(&self) -> ClientSettings {
        ClientSettings::resolve(
            self.connect_timeout,
            self.command_timeout,
            self.max_retries,
            self.retry_delay_ms,
        )
    }
}

/// Vision service from the argument, else `OBJECTFILTER_VISION_SERVICE`.
pub fn resolve_vision_service(param: Option<String>) -> Result<String> {
    resolve_required(param, VISION_SERVICE_ENV_VAR)
}

/// Log to stderr so stdout only carries results.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run `work` to completion on a current-thread runtime, tripping `cancel`
/// on Ctrl-C.
pub fn block_on_interruptible<T>(
    cancel: CancellationToken,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received");
                cancel.cancel();
            }
        });
        work.await
    })
}

/// Print `error[<Kind>]: <message>` and map the error to its exit code.
pub fn report_error(err: &MachineError) -> ExitCode {
    eprintln!("error[{}]: {}", err.kind(), err);
    ExitCode::from(err.exit_code())
}

pub fn render_resources(resources: &[ResourceDescriptor]) -> String {
    let mut out = String::from("Resources:\n");
    for resource in resources {
        out.push_str(&format!("  {}\n", resource));
    }
    out
}

pub fn render_outcome(outcome: &InvocationOutcome, show_resources: bool) -> String {
    let mut out = String::new();
    if show_resources {
        out.push_str(&render_resources(&outcome.resources));
    }
    out.push_str(&format!("Do_Command result: {}\n", outcome.result));
    out
}

/// Pretty JSON for `--json` output.
pub fn render_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| MachineError::Io(e.into()))
}
