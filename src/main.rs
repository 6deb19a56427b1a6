mod config;
mod error;
mod ftp;
mod harvest;
mod logging;
mod remote;
mod session;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use config::Config;
use harvest::Runner;
use log::info;

/// Moves files of one extension from FTP folders to local folders.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file, defaults to `$XDG_CONFIG_HOME/ftpharvest/config.toml`
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Leave harvested files on the server
    #[arg(long)]
    keep_remote: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init();

    let config = Config::load_from_file(args.config).context("loading configuration failed")?;
    let delete_remote = config.delete_remote() && !args.keep_remote;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .context("tokio runtime should be buildable")?;
    let summary = rt.block_on(Runner::new(&config, delete_remote).run());

    for line in summary.to_string().lines() {
        info!("{line}");
    }
    print!("{summary}");
    Ok(())
}
