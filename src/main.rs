mod cli;

use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};

use cli::{Cli, Commands};
use eve_harvest::app::bootstrap::{build_controller, open_store, seed_reference_data};
use eve_harvest::config::load_config;
use eve_harvest::fetch::{shutdown_channel, ShutdownSignal};
use eve_harvest::utils::{current_human_timestamp, today_utc};
use eve_harvest::Result;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_storage() => {
            error!("storage failure, stopping: {err}");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli.config)?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    let store = open_store(&config)?;

    match cli.command {
        Commands::Seed { types, stations } => {
            seed_reference_data(&store, &types, &stations)?;
        }
        Commands::Run { once } => {
            let (trigger, signal) = shutdown_channel();
            let controller = build_controller(config, store, signal)?;

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing in-flight work");
                    trigger.trigger();
                }
            });

            info!("harvest started at {}", current_human_timestamp());
            if once {
                controller.run_cycle(today_utc()).await?;
            } else {
                controller.run_forever().await?;
            }
        }
        Commands::Stats => {
            let controller = build_controller(config, store, ShutdownSignal::never())?;
            controller.collect_market_stats().await?;
        }
    }

    Ok(())
}
