use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::command::{Brightness, Command, Hue, ProtocolConfig, Zone};
use crate::shutdown::{Shutdown, WaitOutcome};
use crate::transport::Transport;
use crate::Result;

/// Handle for one zone of fixtures behind a bridge
///
/// Hue, brightness and white mode act on whichever zone the bridge last
/// powered on, so callers power on the zone before adjusting it.
#[derive(Debug)]
pub struct Lamp<T> {
    transport: T,
    protocol: Arc<ProtocolConfig>,
    zone: Zone,
}

impl<T: Transport> Lamp<T> {
    pub fn new(transport: T, protocol: Arc<ProtocolConfig>, zone: Zone) -> Self {
        Self {
            transport,
            protocol,
            zone,
        }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn protocol(&self) -> &ProtocolConfig {
        &self.protocol
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Encodes and sends a single command
    #[instrument(skip(self))]
    pub async fn send(&self, command: Command) -> Result<()> {
        let frame = self.protocol.encode(command)?;
        debug!("{:?} -> {}", command, frame);
        self.transport.send(frame).await
    }

    /// Turns the zone on and selects it for subsequent commands
    pub async fn power_on(&self) -> Result<()> {
        self.send(Command::On(self.zone)).await?;
        info!("{} powered on", self.zone);
        Ok(())
    }

    pub async fn power_off(&self) -> Result<()> {
        self.send(Command::Off(self.zone)).await?;
        info!("{} powered off", self.zone);
        Ok(())
    }

    /// Turns every zone off, whatever zone this lamp targets
    pub async fn power_off_all(&self) -> Result<()> {
        self.send(Command::Off(Zone::ALL)).await?;
        info!("All zones powered off");
        Ok(())
    }

    pub async fn set_hue(&self, hue: Hue) -> Result<()> {
        self.send(Command::Hue(hue)).await?;
        info!("Hue set to {}", hue.value());
        Ok(())
    }

    pub async fn set_brightness(&self, brightness: Brightness) -> Result<()> {
        self.send(Command::Brightness(brightness)).await?;
        debug!("Brightness set to level {}", brightness.level());
        Ok(())
    }

    pub async fn white_mode(&self) -> Result<()> {
        self.send(Command::WhiteMode).await?;
        info!("White mode enabled");
        Ok(())
    }

    /// Blinks the zone: on, wait, off. With `repeat` it keeps blinking
    /// until shutdown, waiting `interval` between blinks as well.
    #[instrument(skip(self, shutdown))]
    pub async fn blink(
        &self,
        interval: Duration,
        repeat: bool,
        shutdown: &mut Shutdown,
    ) -> Result<WaitOutcome> {
        loop {
            self.power_on().await?;
            let held = shutdown.sleep(interval).await;
            // Never leave the lamp on after a cancelled blink
            self.power_off().await?;
            if held == WaitOutcome::Cancelled {
                return Ok(WaitOutcome::Cancelled);
            }
            if !repeat {
                return Ok(WaitOutcome::Elapsed);
            }
            if shutdown.sleep(interval).await == WaitOutcome::Cancelled {
                return Ok(WaitOutcome::Cancelled);
            }
        }
    }

    /// Steps through every brightness level in white mode, dropping back to
    /// the minimum between levels so each one can be compared by eye.
    #[instrument(skip(self, shutdown))]
    pub async fn cycle_brightness_levels(
        &self,
        hold: Duration,
        shutdown: &mut Shutdown,
    ) -> Result<WaitOutcome> {
        self.power_on().await?;
        if shutdown.sleep(hold).await == WaitOutcome::Cancelled {
            return Ok(WaitOutcome::Cancelled);
        }
        self.white_mode().await?;

        for level in Brightness::ascending() {
            info!("Showing brightness level {}", level.level());
            self.set_brightness(Brightness::MIN).await?;
            if shutdown.sleep(hold).await == WaitOutcome::Cancelled {
                return Ok(WaitOutcome::Cancelled);
            }
            self.set_brightness(level).await?;
            if shutdown.sleep(hold).await == WaitOutcome::Cancelled {
                return Ok(WaitOutcome::Cancelled);
            }
        }
        Ok(WaitOutcome::Elapsed)
    }
}
