// ABOUTME: Entry point for the keychain CLI
// ABOUTME: Parses arguments, sets up logging, and dispatches to the command handlers

use anyhow::Result;
use clap::Parser;
use keychain_cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    keychain_log::init(cli.verbose);

    keychain_cli::run(cli).await
}
