use anyhow::Result;
use asrcore::app;
use asrcore::cli::Cli;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();
    app::init_logging(cli.verbose);
    app::run(cli)
}
