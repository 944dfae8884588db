use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

use hotloop::cli::Cli;
use hotloop::config::Settings;
use hotloop::shutdown::{ShutdownToken, listen_for_interrupt};
use hotloop::{HotloopError, Reloader, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let mut settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", HotloopError::from(e));
            return ExitCode::FAILURE;
        }
    };
    cli.apply_overrides(&mut settings);
    logging::init_with_config(&settings.logging);

    let reloader = match Reloader::builder()
        .root(cli.directory)
        .command(cli.command)
        .excludes(cli.exclude)
        .settings(settings)
        .build()
    {
        Ok(reloader) => reloader,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = ShutdownToken::new();
    let _signals = match listen_for_interrupt(shutdown.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error: {}", HotloopError::Signal(e));
            return ExitCode::FAILURE;
        }
    };

    match reloader.run(shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("[hotloop] {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
