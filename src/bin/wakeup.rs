use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use milight_wakeup::*;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Fade a Milight zone in every morning and out every evening
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Morning in five seconds, short fade-in and debug logging
    #[arg(short, long)]
    testing: bool,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the zone from the config (1-5)
    #[arg(short, long)]
    zone: Option<u8>,

    /// Override the morning time (HH:MM)
    #[arg(long)]
    morning: Option<TimeOfDay>,

    /// Override the evening time (HH:MM)
    #[arg(long)]
    evening: Option<TimeOfDay>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.testing {
        "milight_wakeup=debug,wakeup=debug"
    } else {
        "milight_wakeup=info,wakeup=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .compact()
        .init();

    color_eyre::install()?;
    debug!("Parsed arguments: {:?}", args);

    let config = Config::load_or_default(args.config.as_deref())?;
    let clock = SystemClock;

    let mut schedule = config.schedule.clone();
    if let Some(zone) = args.zone {
        schedule.zone = Zone::new(zone)?;
    }
    if let Some(morning) = args.morning {
        schedule.morning = morning;
    }
    if let Some(evening) = args.evening {
        schedule.evening = evening;
    }
    if args.testing {
        info!("Testing mode: morning in five seconds");
        schedule = schedule.for_testing(clock.now());
    }

    let (trigger, shutdown) = Shutdown::new();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested");
        trigger.trigger();
    });

    let transport = UdpTransport::new(config.transport.clone());
    let mut scheduler = Scheduler::new(
        transport,
        Arc::new(config.protocol),
        clock,
        schedule,
        shutdown,
    )?;

    scheduler.initialize().await?;
    scheduler.run().await?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
