use crate::demo::{run_demo, DemoArgs};
use crate::server;
use crate::sync::{run_sync, SyncArgs};
use clap::{Args, Parser, Subcommand};
use leave_desk::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Leave Desk",
    about = "Run the vacation request service, import HR exports, or walk through a demo",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Import an HR export once and print what was applied
    Sync(SyncArgs),
    /// Run a scripted request, approval, and overdraw scenario
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Sync(args) => run_sync(args),
        Command::Demo(args) => run_demo(args),
    }
}
