use chrono::NaiveDateTime;
use serde::Serialize;
use std::{collections::VecDeque, fmt};
use sw420_protocol::TelemetryRecord;

/// Number of most recent values kept.
pub(crate) const HISTORY_LENGTH: usize = 100;

#[derive(Debug, Serialize)]
pub(crate) struct CollectorStats {
    alert_threshold: u16,

    total_readings: u64,
    min_value: Option<u16>,
    max_value: Option<u16>,
    sum_values: u64,
    high_vibration_events: u64,

    #[serde(skip)]
    history: VecDeque<u16>,

    last_timestamp: Option<NaiveDateTime>,
    sensor_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Recorded {
    pub alert: bool,
    /// First reading from any sensor.
    pub new_sensor: bool,
}

impl CollectorStats {
    pub(crate) fn new(alert_threshold: u16) -> Self {
        Self {
            alert_threshold,
            total_readings: 0,
            min_value: None,
            max_value: None,
            sum_values: 0,
            high_vibration_events: 0,
            history: VecDeque::with_capacity(HISTORY_LENGTH),
            last_timestamp: None,
            sensor_id: None,
        }
    }

    pub(crate) fn record(&mut self, record: &TelemetryRecord) -> Recorded {
        let value = record.value;

        let new_sensor = self.sensor_id.is_none();
        if new_sensor {
            self.sensor_id = Some(record.sensor_id.clone());
        }
        self.last_timestamp = Some(record.timestamp);

        self.total_readings += 1;
        self.sum_values += u64::from(value);
        self.min_value = Some(self.min_value.map_or(value, |v| v.min(value)));
        self.max_value = Some(self.max_value.map_or(value, |v| v.max(value)));

        if self.history.len() == HISTORY_LENGTH {
            self.history.pop_front();
        }
        self.history.push_back(value);

        let alert = value > self.alert_threshold;
        if alert {
            self.high_vibration_events += 1;
        }

        Recorded { alert, new_sensor }
    }

    pub(crate) fn total_readings(&self) -> u64 {
        self.total_readings
    }

    pub(crate) fn average(&self) -> Option<f64> {
        (self.total_readings > 0).then(|| self.sum_values as f64 / self.total_readings as f64)
    }

    /// Average over the retained history only.
    pub(crate) fn recent_average(&self) -> Option<f64> {
        let len = self.history.len();
        (len > 0).then(|| self.history.iter().map(|v| f64::from(*v)).sum::<f64>() / len as f64)
    }
}

impl fmt::Display for CollectorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Some(min), Some(max), Some(average)) =
            (self.min_value, self.max_value, self.average())
        else {
            return write!(f, "No readings received");
        };

        writeln!(f, "Statistics:")?;
        writeln!(f, "  Total readings:        {}", self.total_readings)?;
        writeln!(f, "  Minimum value:         {min}")?;
        writeln!(f, "  Maximum value:         {max}")?;
        writeln!(f, "  Average value:         {average:.1}")?;
        if let Some(recent) = self.recent_average() {
            writeln!(
                f,
                "  Recent average:        {recent:.1} (last {} readings)",
                self.history.len()
            )?;
        }
        write!(f, "  High vibration events: {}", self.high_vibration_events)?;

        if let Some(ts) = &self.last_timestamp {
            write!(
                f,
                "\n  Last reading:          {}",
                ts.format(sw420_protocol::TIMESTAMP_FORMAT)
            )?;
        }

        Ok(())
    }
}
