use crate::sensor::RawValue;

/// Default ADC cutoff for the analog output.
pub(crate) const DEFAULT_THRESHOLD: u16 = 32000;

/// How a raw reading is turned into "vibrating" or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interpretation {
    /// The reading is already a level.
    Digital,
    /// An ADC count at or above the threshold means vibration.
    ThresholdCompare(u16),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{raw:?} cannot be interpreted as {interpretation:?}")]
pub(crate) struct InterpretError {
    pub raw: RawValue,
    pub interpretation: Interpretation,
}

impl Interpretation {
    pub(crate) fn observe(&self, raw: RawValue) -> Result<bool, InterpretError> {
        match (self, raw) {
            (Interpretation::Digital, RawValue::Digital(level)) => Ok(level),
            (Interpretation::Digital, RawValue::Analog(0)) => Ok(false),
            (Interpretation::Digital, RawValue::Analog(1)) => Ok(true),
            (Interpretation::ThresholdCompare(threshold), RawValue::Analog(value)) => {
                Ok(value >= *threshold)
            }
            _ => Err(InterpretError {
                raw,
                interpretation: *self,
            }),
        }
    }
}
