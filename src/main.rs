#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::info;

use objectfilter_ctl::cli::{self, ConnectionArgs};
use objectfilter_ctl::machine::Result;
use objectfilter_ctl::machine::orchestrator::{DEFAULT_KIND, DEFAULT_RESOURCE, Orchestrator};
use objectfilter_ctl::machine::transport::SimTransport;

/// Switch the vision service an objectfilter camera sends frames to.
#[derive(Parser)]
#[command(name = "objectfilter", version, about, long_about = None)]
struct Cli {
    /// Vision service to activate [env: OBJECTFILTER_VISION_SERVICE]
    #[arg(value_name = "VISION_SERVICE")]
    vision_service: Option<String>,

    #[command(flatten)]
    connection: ConnectionArgs,

    /// Resource to send the command to
    #[arg(long, default_value = DEFAULT_RESOURCE)]
    resource: String,

    /// Kind the resource must have
    #[arg(long, default_value = DEFAULT_KIND)]
    kind: String,

    /// Print the machine's resources before the result
    #[arg(long)]
    show_resources: bool,

    /// Print the full outcome as JSON
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
    let vision_service = cli::resolve_vision_service(args.vision_service)?;
    let config = args.connection.connection_config()?;
    let settings = args.connection.settings();

    info!("Connecting to {} as {}", config.address(), config.api_key_id());

    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(Arc::new(SimTransport::with_defaults()?), settings)
        .with_resource(args.resource)
        .with_kind(args.kind)
        .with_cancellation(cancel.clone());

    let outcome =
        cli::block_on_interruptible(cancel, orchestrator.run(&config, &vision_service))?;

    if args.json {
        println!("{}", cli::render_json(&outcome)?);
    } else {
        print!("{}", cli::render_outcome(&outcome, args.show_resources));
    }
    Ok(())
}
