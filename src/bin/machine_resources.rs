#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use tokio_util::sync::CancellationToken;

use objectfilter_ctl::cli::{self, ConnectionArgs};
use objectfilter_ctl::machine::Result;
use objectfilter_ctl::machine::orchestrator::Orchestrator;
use objectfilter_ctl::machine::transport::SimTransport;

/// List the resources a remote machine exposes.
#[derive(Parser)]
#[command(name = "machine-resources", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Print the session and resources as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    dotenv().ok();
    cli::init_tracing();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => cli::report_error(&e),
    }
}

fn run(args: Cli) -> Result<()> {
    let config = args.connection.connection_config()?;
    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(
        Arc::new(SimTransport::with_defaults()?),
        args.connection.settings(),
    )
    .with_cancellation(cancel.clone());

    let (session, resources) =
        cli::block_on_interruptible(cancel, orchestrator.list_resources(&config))?;

    if args.json {
        println!(
            "{}",
            cli::render_json(&serde_json::json!({
                "session": session,
                "resources": resources,
            }))?
        );
    } else {
        print!("{}", cli::render_resources(&resources));
    }
    Ok(())
}
