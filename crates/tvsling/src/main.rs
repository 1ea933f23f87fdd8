mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    // First Ctrl-C cancels cooperatively; a second one falls through to
    // the default handler and kills the process.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    if let Err(err) = run(cli, &cancel).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<(), CliError> {
    match cli.command {
        Command::Scan(args) => commands::scan::run(&args, &cli.global, cancel).await,
        Command::Validate(args) => commands::scan::validate(&args, &cli.global, cancel).await,
        Command::Cert(args) => commands::cert::handle(args, &cli.global).await,
        Command::Patch(args) => commands::patch::run(&args, &cli.global).await,
        Command::Install(args) => commands::install::run(&args, &cli.global, cancel).await,
        Command::Config(args) => commands::config_cmd::handle(&args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "tvsling", &mut std::io::stdout());
            Ok(())
        }
    }
}
