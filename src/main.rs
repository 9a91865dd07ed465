// src/main.rs
use acctkeep::cli;
use acctkeep::error::AppError;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::init();
    log::info!("Starting acctkeep");

    let cli_args = cli::Cli::parse();

    if let Err(e) = cli::handle_cli_command(cli_args).await {
        log::error!("Command failed: {:#?}", e);
        eprintln!("Error: {}", e);
        return Err(e);
    }

    log::info!("acctkeep finished successfully.");
    Ok(())
}
