/*!
 # Milight Wake-up Light Library

 A Rust library for driving Milight (LimitlessLED v3-v5) Wi-Fi bridges over
 their UDP broadcast protocol, plus a daily scheduler that fades a zone in
 every morning and out every evening.

 ## Features

 * Power on/off per zone (or all zones off)
 * Hue, brightness and white mode
 * Timed brightness fades (19 steps)
 * Morning/evening scheduling with cancellable waits

 ## Example

 ```no_run
 use std::sync::Arc;
 use std::time::Duration;
 use milight_wakeup::*;

 #[tokio::main]
 async fn main() -> Result<()> {
     let config = Config::default();
     let transport = UdpTransport::new(config.transport.clone());
     let lamp = Lamp::new(transport, Arc::new(config.protocol), Zone::new(3)?);

     lamp.power_on().await?;
     lamp.set_hue(Hue::RED).await?;

     let (_trigger, mut shutdown) = Shutdown::new();
     fade(&lamp, &FadeSpec::fade_out(Duration::from_secs(15)), &mut shutdown).await?;
     Ok(())
 }
 ```
*/

use thiserror::Error;

/// Custom error types for the Milight wake-up library
#[derive(Error, Debug)]
pub enum Error {
    /// A zone, brightness level or hue outside its defined range
    #[error("{what} {value} out of range ({min}..={max})")]
    ValueOutOfRange {
        what: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// The protocol table has no code for this zone and action
    #[error("Zone {0} cannot be powered on: no all-zones on-code configured")]
    ZoneNotAddressable(u8),

    /// The datagram could not be sent
    #[error("Transport failure: {0}")]
    Transport(#[source] std::io::Error),

    /// Configuration values that cannot work together
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file is not valid TOML for our schema
    #[error(transparent)]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error outside the transport (reading config files)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod clock;
pub mod command;
pub mod config;
pub mod fader;
pub mod lamp;
pub mod scheduler;
pub mod shutdown;
pub mod transport;

pub use clock::{Clock, SimulatedClock, SystemClock};
pub use command::{Brightness, Command, CommandFrame, Hue, ProtocolConfig, Zone};
pub use config::Config;
pub use fader::{fade, FadeDirection, FadeSpec};
pub use lamp::Lamp;
pub use scheduler::{
    next_occurrence, plan, Phase, ScheduleConfig, Scheduler, StepOutcome, TimeOfDay, Transition,
};
pub use shutdown::{Shutdown, ShutdownTrigger, WaitOutcome};
pub use transport::{Transport, TransportConfig, UdpTransport};
