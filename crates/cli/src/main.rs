use anyhow::Result;
use clap::Parser;
use env_logger::init;
use glyphtrim_cli::cli::Cli;

fn main() -> Result<()> {
    init();
    Cli::parse().command.run()
}
