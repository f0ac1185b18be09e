use crate::{
    sensor::{
        gpio::{self, GpioSysfsSource},
        iio::{self, IioSysfsSource},
        ReadError, SampleSource, DEFAULT_SENSOR_ID,
    },
    telemetry::TelemetryConfig,
    vibration::{Interpretation, DEFAULT_DEBOUNCE_INTERVAL, DEFAULT_THRESHOLD},
};
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Deserialize)]
pub(crate) struct Config {
    #[serde(default = "default_debounce_ms")]
    debounce_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
    #[serde(default = "default_status_interval_secs")]
    status_interval_secs: u64,

    pub sensor: SensorConfig,

    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_INTERVAL.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_status_interval_secs() -> u64 {
    10
}

impl Config {
    pub(crate) fn load(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("SW420")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config = config.try_deserialize::<Self>()?;

        if config.poll_interval_ms == 0 || config.status_interval_secs == 0 {
            anyhow::bail!("poll and status intervals must be non-zero");
        }

        Ok(config)
    }

    pub(crate) fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub(crate) fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SensorKind {
    Gpio,
    Iio,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SensorConfig {
    #[serde(default = "default_sensor_id")]
    pub id: String,

    pub kind: SensorKind,

    sysfs_root: Option<PathBuf>,

    #[serde(default = "default_gpio_pin")]
    pin: u32,

    #[serde(default)]
    device: u32,
    #[serde(default)]
    channel: u32,
    #[serde(default = "default_threshold")]
    threshold: u16,
}

fn default_sensor_id() -> String {
    DEFAULT_SENSOR_ID.into()
}

fn default_gpio_pin() -> u32 {
    gpio::DEFAULT_PIN
}

fn default_threshold() -> u16 {
    DEFAULT_THRESHOLD
}

impl SensorConfig {
    pub(crate) fn interpretation(&self) -> Interpretation {
        match self.kind {
            SensorKind::Gpio => Interpretation::Digital,
            SensorKind::Iio => Interpretation::ThresholdCompare(self.threshold),
        }
    }

    pub(crate) async fn open_source(&self) -> Result<Box<dyn SampleSource>, ReadError> {
        let source: Box<dyn SampleSource> = match self.kind {
            SensorKind::Gpio => Box::new(GpioSysfsSource::open(
                self.id.clone(),
                self.pin,
                self.sysfs_root
                    .clone()
                    .unwrap_or_else(|| gpio::DEFAULT_SYSFS_ROOT.into()),
            )
            .await?),
            SensorKind::Iio => Box::new(IioSysfsSource::open(
                self.id.clone(),
                self.device,
                self.channel,
                self.sysfs_root
                    .clone()
                    .unwrap_or_else(|| iio::DEFAULT_SYSFS_ROOT.into()),
            )?),
        };

        Ok(source)
    }
}
