mod config;
mod error;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use peerscout::{Service, StaticDriver};
use tokio::time::{Instant, Interval, interval_at};
use tracing::{info, level_filters::LevelFilter, warn};

use crate::config::Config;
use crate::error::AppError;

/// Watch a discovery topic and print every peer sighting
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file, defaults to $XDG_CONFIG_HOME/peerscout/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Topic to subscribe to
    #[arg(short, long)]
    topic: String,

    /// Re-run the lookup every SECS seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pull_interval: Option<u64>,

    /// Stop after SECS seconds instead of waiting for Ctrl+C
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Print the loaded configuration before starting
    #[arg(long)]
    print_config: bool,
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        },
        None => std::future::pending().await,
    }
}

async fn deadline(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

fn build_service(config: &Config) -> Result<Service, AppError> {
    let mut driver = StaticDriver::new("static");
    for (topic, record) in config.peer_records()? {
        driver.insert(topic, record);
    }
    info!(topics = ?driver.topics().collect::<Vec<_>>(), "static peer table loaded");

    Ok(Service::builder().driver(driver).config(config.service.clone()).build())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref())?;

    let level = LevelFilter::from_str(&config.log_level)
        .map_err(|_| AppError::LogLevel(config.log_level.clone()))?;
    logger::init_with_level(level);

    if cli.print_config {
        println!("{config}");
    }

    let service = build_service(&config)?;
    let mut subscription = service.subscribe(cli.topic.as_str());
    info!(topic = %cli.topic, drivers = ?service.driver_names(), "scouting");

    if let Err(error) = subscription.pull().await {
        warn!(%error, "initial lookup found no driver");
    }

    let mut ticker = cli.pull_interval.map(|secs| {
        let period = Duration::from_secs(secs);
        interval_at(Instant::now() + period, period)
    });

    let stop = deadline(cli.duration.map(Duration::from_secs));
    tokio::pin!(stop);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            result = &mut interrupt => {
                result?;
                info!("interrupted");
                break;
            },
            _ = &mut stop => {
                info!("duration elapsed");
                break;
            },
            _ = next_tick(&mut ticker) => {
                if let Err(error) = subscription.pull().await {
                    warn!(%error, "lookup found no driver");
                }
            },
            record = subscription.out().recv() => match record {
                Some(record) => println!("{record}"),
                None => break,
            },
        }
    }

    subscription.close();
    Ok(())
}
