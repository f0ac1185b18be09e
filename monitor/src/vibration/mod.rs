//! Debounced vibration state and statistics.
//!
//! Raw readings are interpreted as a level and fed through a time based debounce:
//!
//! ```text
//!          observed = true, window elapsed (count += 1)
//!  Parked ─────────────────────────────────────────────► Vibrating
//!         ◄─────────────────────────────────────────────
//!          observed = false, window elapsed
//! ```
//!
//! The window is always measured from the last *accepted* change, so a signal that
//! chatters faster than the window settles to a single edge instead of holding the
//! state forever. Read failures leave every piece of state untouched.

mod interpretation;

pub(crate) use self::interpretation::{InterpretError, Interpretation, DEFAULT_THRESHOLD};
use crate::sensor::{RawValue, ReadError};
use std::{
    fmt,
    time::{Duration, Instant},
};

pub(crate) const DEFAULT_DEBOUNCE_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VibrationState {
    Parked,
    Vibrating,
}

impl VibrationState {
    pub(crate) fn is_vibrating(&self) -> bool {
        *self == Self::Vibrating
    }
}

impl From<bool> for VibrationState {
    fn from(value: bool) -> Self {
        if value {
            Self::Vibrating
        } else {
            Self::Parked
        }
    }
}

impl fmt::Display for VibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parked => write!(f, "PARKED"),
            Self::Vibrating => write!(f, "VIBRATING"),
        }
    }
}

/// The engine could not be brought up from its seeding sample.
#[derive(Debug, thiserror::Error)]
pub(crate) enum InitializationError {
    #[error("failed to read initial sample")]
    Read(#[source] ReadError),
    #[error("malformed initial sample")]
    Malformed(#[source] InterpretError),
}

/// A sample could not be used. The engine keeps the `held` state.
#[derive(Debug, thiserror::Error)]
pub(crate) enum SampleError {
    #[error("failed to read sample, holding {held}")]
    Read {
        held: VibrationState,
        #[source]
        source: ReadError,
    },
    #[error("malformed sample, holding {held}")]
    Malformed {
        held: VibrationState,
        #[source]
        source: InterpretError,
    },
}

impl SampleError {
    pub(crate) fn held_state(&self) -> VibrationState {
        match self {
            SampleError::Read { held, .. } | SampleError::Malformed { held, .. } => *held,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SampleOutcome {
    pub state: VibrationState,
    /// True only when this sample was accepted as a transition.
    pub changed: bool,
}

/// Debounce state machine for a single sensor.
///
/// Not internally synchronised; whoever drives [`VibrationEngine::sample`] owns it.
#[derive(Debug, Clone)]
pub(crate) struct VibrationEngine {
    interpretation: Interpretation,
    state: VibrationState,
    last_change_time: Instant,
    debounce_interval: Duration,
    vibration_count: u64,
    last_vibration_time: Instant,
}

impl VibrationEngine {
    /// Seeds the state from `initial` without counting it as a vibration.
    pub(crate) fn new(
        initial: Result<RawValue, ReadError>,
        interpretation: Interpretation,
        debounce_interval: Duration,
        now: Instant,
    ) -> Result<Self, InitializationError> {
        let raw = initial.map_err(InitializationError::Read)?;
        let observed = interpretation
            .observe(raw)
            .map_err(InitializationError::Malformed)?;

        Ok(Self {
            interpretation,
            state: observed.into(),
            last_change_time: now,
            debounce_interval,
            vibration_count: 0,
            last_vibration_time: now,
        })
    }

    /// Feeds one raw sample taken at `now` through the debounce.
    ///
    /// A change is only accepted once `debounce_interval` has passed since the last
    /// accepted change. Rejected samples do not restart the window.
    pub(crate) fn sample(
        &mut self,
        raw: Result<RawValue, ReadError>,
        now: Instant,
    ) -> Result<SampleOutcome, SampleError> {
        let held = self.state;

        let raw = raw.map_err(|source| SampleError::Read { held, source })?;
        let observed: VibrationState = self
            .interpretation
            .observe(raw)
            .map_err(|source| SampleError::Malformed { held, source })?
            .into();

        let changed = observed != self.state
            && now.saturating_duration_since(self.last_change_time) >= self.debounce_interval;

        if changed {
            self.state = observed;
            self.last_change_time = now;

            if observed.is_vibrating() {
                self.vibration_count += 1;
                self.last_vibration_time = now;
            }
        }

        Ok(SampleOutcome {
            state: self.state,
            changed,
        })
    }

    pub(crate) fn state(&self) -> VibrationState {
        self.state
    }

    pub(crate) fn last_change_time(&self) -> Instant {
        self.last_change_time
    }

    pub(crate) fn interpretation(&self) -> Interpretation {
        self.interpretation
    }

    pub(crate) fn vibration_count(&self) -> u64 {
        self.vibration_count
    }

    /// Time since the last accepted vibration, or since creation if there was none.
    pub(crate) fn time_since_last_vibration(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_vibration_time)
    }

    pub(crate) fn debounce_interval(&self) -> Duration {
        self.debounce_interval
    }

    /// Applies from the next call to [`VibrationEngine::sample`].
    pub(crate) fn set_debounce_interval(&mut self, debounce_interval: Duration) {
        self.debounce_interval = debounce_interval;
    }

    pub(crate) fn reset_vibration_count(&mut self) {
        self.vibration_count = 0;
    }

    pub(crate) fn status(&self, now: Instant) -> Status {
        Status {
            state: self.state,
            vibration_count: self.vibration_count,
            since_last_vibration: self.time_since_last_vibration(now),
            debounce_interval: self.debounce_interval,
        }
    }
}

/// Point in time snapshot of an engine, for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Status {
    pub state: VibrationState,
    pub vibration_count: u64,
    pub since_last_vibration: Duration,
    pub debounce_interval: Duration,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "State: {}", self.state)?;
        writeln!(f, "Vibrations detected: {}", self.vibration_count)?;
        writeln!(
            f,
            "Time since last vibration: {}ms",
            self.since_last_vibration.as_millis()
        )?;
        write!(f, "Debounce: {}ms", self.debounce_interval.as_millis())
    }
}
