use crate::demo::{run_demo, run_evaluate, DemoArgs, EvaluateArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use portfolio_insights::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Portfolio Insights",
    about = "Evaluate property metrics against the portfolio and serve dashboard insights",
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
    /// Run insight passes over exported snapshots
    Insights {
        #[command(subcommand)]
        command: InsightsCommand,
    },
    /// Walk through the insight lifecycle with sample properties
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum InsightsCommand {
    /// Evaluate a JSON or CSV snapshot export and print the dashboard
    Evaluate(EvaluateArgs),
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
        Command::Insights {
            command: InsightsCommand::Evaluate(args),
        } => run_evaluate(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
