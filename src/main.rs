use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use milight_wakeup::*;
use tokio::time::Duration;
use tracing::{debug, info, instrument};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Send single commands to a Milight bridge", long_about = None)]
struct Cli {
    /// Zone to address (0 = all zones, 1-5)
    #[arg(short, long, global = true, default_value_t = 3)]
    zone: u8,

    /// TOML config file (protocol tables, bridge address, pacing)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log every frame sent
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Power on, set hue red and fade out over 15 seconds
    Demo,
    /// Turn the zone on
    On,
    /// Turn the zone off (zone 0 turns every zone off)
    Off,
    /// Set hue
    Hue {
        /// Colour wheel position (0-255)
        value: u8,
    },
    /// Set hue to red
    Red,
    /// Set hue to blue
    Blue,
    /// Set brightness
    Brightness {
        /// Brightness level (0-18)
        #[arg(value_parser = clap::value_parser!(u8).range(0..=18))]
        level: u8,
    },
    /// Switch to white mode
    White,
    /// Blink the zone on and off
    Blink {
        /// Seconds on, and off between blinks
        #[arg(short, long, default_value_t = 1.0)]
        interval: f64,
        /// Keep blinking until Ctrl-C
        #[arg(short, long)]
        repeat: bool,
    },
    /// Fade brightness over a number of seconds
    Fade {
        #[arg(short, long, default_value_t = 15.0)]
        seconds: f64,
        /// Fade out instead of in
        #[arg(long)]
        out: bool,
    },
    /// Show every brightness level in turn
    Levels {
        /// Seconds to hold each level
        #[arg(long, default_value_t = 1.0)]
        hold: f64,
    },
    /// Print the effective configuration as TOML
    PrintConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "milight_wakeup=debug,milightc=debug"
    } else {
        "milight_wakeup=info,milightc=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .compact()
        .init();

    color_eyre::install()?;
    debug!("Parsed command line arguments");

    let config = Config::load_or_default(cli.config.as_deref())?;

    let zone = Zone::new(cli.zone)?;
    let transport = UdpTransport::new(config.transport.clone());
    let lamp = Lamp::new(transport, Arc::new(config.protocol.clone()), zone);

    // Ctrl-C stops blinks, fades and level cycles cleanly
    let (trigger, mut shutdown) = Shutdown::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            trigger.trigger();
        }
    });

    match cli.command.unwrap_or(Commands::Demo) {
        Commands::Demo => run_demo(&lamp, &mut shutdown).await?,
        Commands::On => lamp.power_on().await?,
        Commands::Off => lamp.power_off().await?,
        Commands::Hue { value } => lamp.set_hue(Hue::from(value)).await?,
        Commands::Red => lamp.set_hue(Hue::RED).await?,
        Commands::Blue => lamp.set_hue(Hue::BLUE).await?,
        Commands::Brightness { level } => lamp.set_brightness(Brightness::new(level)?).await?,
        Commands::White => lamp.white_mode().await?,
        Commands::Blink { interval, repeat } => {
            lamp.blink(seconds(interval)?, repeat, &mut shutdown).await?;
        }
        Commands::Fade { seconds: secs, out } => {
            let duration = seconds(secs)?;
            let spec = if out {
                FadeSpec::fade_out(duration)
            } else {
                FadeSpec::fade_in(duration)
            };
            fade(&lamp, &spec, &mut shutdown).await?;
        }
        Commands::Levels { hold } => {
            lamp.cycle_brightness_levels(seconds(hold)?, &mut shutdown)
                .await?;
        }
        Commands::PrintConfig => print!("{}", config.to_toml_string()?),
    }

    Ok(())
}

fn seconds(value: f64) -> Result<Duration> {
    Ok(Duration::try_from_secs_f64(value)?)
}

/// Power on, turn red and fade out
#[instrument(skip(lamp, shutdown))]
async fn run_demo(lamp: &Lamp<UdpTransport>, shutdown: &mut Shutdown) -> Result<()> {
    info!("Running demo on {}", lamp.zone());
    lamp.power_on().await?;
    lamp.set_hue(Hue::RED).await?;
    fade(lamp, &FadeSpec::fade_out(Duration::from_secs(15)), shutdown).await?;
    info!("Demo completed!");
    Ok(())
}
