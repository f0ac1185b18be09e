//! Telemetry datagram shared by the monitor and the collector.
//!
//! A record is a single line of comma separated fields:
//!
//! ```text
//! sensor_id,timestamp,value,unit
//! SW420_VIBRATION,2025-10-22T15:30:45,45000,ADC
//! ```
//!
//! Records are written with [`TIMESTAMP_FORMAT`]. Parsing also accepts other ISO 8601
//! forms (fractional seconds, `Z` or a UTC offset), keeping the sender's wall clock time.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Largest datagram the collector will accept.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub sensor_id: String,
    pub timestamp: NaiveDateTime,
    pub value: u16,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected 4 fields, got {0}")]
    FieldCount(usize),
    #[error("empty {0} field")]
    EmptyField(&'static str),
    #[error("{0} field contains a separator or line break")]
    InvalidCharacter(&'static str),
    #[error("invalid timestamp \"{0}\"")]
    InvalidTimestamp(String),
    #[error("invalid value \"{0}\"")]
    InvalidValue(String),
}

impl TelemetryRecord {
    pub fn new(
        sensor_id: impl Into<String>,
        timestamp: NaiveDateTime,
        value: u16,
        unit: impl Into<String>,
    ) -> Result<Self, ParseError> {
        let sensor_id = sensor_id.into();
        let unit = unit.into();

        check_text_field("sensor_id", &sensor_id)?;
        check_text_field("unit", &unit)?;

        Ok(Self {
            sensor_id,
            timestamp,
            value,
            unit,
        })
    }
}

fn check_text_field(name: &'static str, s: &str) -> Result<(), ParseError> {
    if s.is_empty() {
        Err(ParseError::EmptyField(name))
    } else if s.contains(&[',', '\n', '\r'][..]) {
        Err(ParseError::InvalidCharacter(name))
    } else {
        Ok(())
    }
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.sensor_id,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.value,
            self.unit
        )
    }
}

impl FromStr for TelemetryRecord {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(',').collect();

        let &[sensor_id, timestamp, value, unit] = fields.as_slice() else {
            return Err(ParseError::FieldCount(fields.len()));
        };

        let timestamp = parse_timestamp(timestamp)
            .ok_or_else(|| ParseError::InvalidTimestamp(timestamp.to_string()))?;

        let value = value
            .parse()
            .map_err(|_| ParseError::InvalidValue(value.to_string()))?;

        Self::new(sensor_id, timestamp, value, unit)
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    s.parse::<NaiveDateTime>()
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|t| t.naive_local()))
        .ok()
}
