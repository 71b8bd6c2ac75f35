use crate::demo::{run_allocate, run_allocations, run_demo, AllocateArgs, AllocationsArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use jobs_board::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Jobs Board Interview Allocation",
    about = "Serve, run and inspect interview allocations for residency cohorts",
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
    /// Run an allocation for one residency against the configured database
    Allocate(AllocateArgs),
    /// Print or export the stored allocation for one residency
    Allocations(AllocationsArgs),
    /// Seed an in-memory cohort, allocate it and print the fill tables
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
        Command::Allocate(args) => run_allocate(args),
        Command::Allocations(args) => run_allocations(args),
        Command::Demo(args) => run_demo(args),
    }
}
