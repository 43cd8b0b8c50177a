mod cli;
pub mod downloader;

use anyhow::Context;
use clap::Parser;

pub fn run() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    cli::init_logging(args.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let success = runtime.block_on(cli::execute(args))?;
    if !success {
        std::process::exit(1);
    }
    Ok(())
}
