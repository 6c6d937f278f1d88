use clap::Parser;
use mailpeek::app::{initialize_client, process_messages, RunSettings};
use mailpeek::cli::{handle_token_clear, log_filter, Cli};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.clear_token {
        return match handle_token_clear(&cli) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Failed to clear cached token: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let client = match initialize_client(&cli).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Unable to set up Gmail client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings = RunSettings::from_cli(&cli);
    let mut stdout = std::io::stdout().lock();
    match process_messages(&client, &settings, &mut stdout).await {
        Ok(report) if report.failed.is_empty() => ExitCode::SUCCESS,
        Ok(report) => {
            eprintln!(
                "{} message(s) printed, {} failed",
                report.printed,
                report.failed.len()
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
