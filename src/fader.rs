/*!
 # Brightness fades

 A fade walks all 19 brightness levels, one command per level, with the
 fade's duration split evenly between the steps.
*/

use std::fmt;
use std::time::Duration;

use tracing::{info, instrument};

use crate::command::Brightness;
use crate::lamp::Lamp;
use crate::shutdown::{Shutdown, WaitOutcome};
use crate::transport::Transport;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    /// Darkest to brightest
    In,
    /// Brightest to darkest
    Out,
}

impl fmt::Display for FadeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FadeDirection::In => write!(f, "in"),
            FadeDirection::Out => write!(f, "out"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeSpec {
    pub duration: Duration,
    pub direction: FadeDirection,
}

impl FadeSpec {
    pub fn fade_in(duration: Duration) -> Self {
        Self {
            duration,
            direction: FadeDirection::In,
        }
    }

    pub fn fade_out(duration: Duration) -> Self {
        Self {
            duration,
            direction: FadeDirection::Out,
        }
    }

    /// Pause after each level
    pub fn step_duration(&self) -> Duration {
        self.duration / u32::from(Brightness::LEVELS)
    }

    /// The levels to send, each paired with the pause that follows it
    pub fn steps(&self) -> impl Iterator<Item = (Brightness, Duration)> {
        let pause = self.step_duration();
        let levels: Box<dyn Iterator<Item = Brightness> + Send> = match self.direction {
            FadeDirection::In => Box::new(Brightness::ascending()),
            FadeDirection::Out => Box::new(Brightness::ascending().rev()),
        };
        levels.map(move |level| (level, pause))
    }
}

/// Runs a fade on `lamp`, stopping early if `shutdown` fires.
///
/// A zero duration still sends all 19 levels, just without pauses.
#[instrument(skip(lamp, spec, shutdown), fields(zone = %lamp.zone(), direction = %spec.direction))]
pub async fn fade<T: Transport>(
    lamp: &Lamp<T>,
    spec: &FadeSpec,
    shutdown: &mut Shutdown,
) -> Result<WaitOutcome> {
    info!(
        "Fading {} over {:?} ({:?} per step)",
        spec.direction,
        spec.duration,
        spec.step_duration()
    );

    for (level, pause) in spec.steps() {
        if shutdown.is_triggered() {
            info!("Fade cancelled before level {}", level.level());
            return Ok(WaitOutcome::Cancelled);
        }
        lamp.set_brightness(level).await?;
        if shutdown.sleep(pause).await == WaitOutcome::Cancelled {
            info!("Fade cancelled after level {}", level.level());
            return Ok(WaitOutcome::Cancelled);
        }
    }

    info!("Fade {} complete", spec.direction);
    Ok(WaitOutcome::Elapsed)
}
