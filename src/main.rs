//! `damage-reflection` - damage interception and punishment policy engine

use clap::Parser;

use damage_reflection::cli::args::Cli;
use damage_reflection::cli::commands;
use damage_reflection::error::ExitCode;
use damage_reflection::observability::{LogFormat, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        let format = if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Human
        };
        init_logging(format, cli.verbose, cli.color);
    }

    // Exit on the first signal
    tokio::spawn(async {
        let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        else {
            eprintln!("warning: failed to register SIGTERM handler");
            return;
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
            _ = sigterm.recv() => std::process::exit(ExitCode::TERMINATED),
        }
    });

    let result = commands::dispatch(cli).await;

    match result {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
