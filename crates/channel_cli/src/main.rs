mod cli;
mod commands;
mod config;

use std::process::ExitCode;
use std::sync::Arc;

use channel_engine::HttpChannelService;
use clap::Parser;
use crawl_logging::{crawl_debug, crawl_error, crawl_warn, LogDestination};
use tokio::runtime;
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::commands::Runner;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let destination = match &cli.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    crawl_logging::initialize(destination, cli.log_level());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            crawl_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let catalog = config::load_catalog(cli.catalog.as_deref())?;
    let settings = config::service_settings(&cli.gateway)?;
    crawl_debug!("Using gateway {}", settings.base_url);
    let service = HttpChannelService::new(settings)?;

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async move {
        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                crawl_warn!("Interrupt received, stopping after the current channel");
                interrupt.cancel();
            }
        });

        Runner::new(Arc::new(service), catalog, cancel)
            .run(cli.command)
            .await
    })
}
