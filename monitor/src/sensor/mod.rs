pub(crate) mod gpio;
pub(crate) mod iio;

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

pub(crate) const DEFAULT_SENSOR_ID: &str = "SW420_VIBRATION";

/// A single unprocessed reading from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawValue {
    /// Level of a GPIO input.
    Digital(bool),
    /// ADC channel count, full scale 65535.
    Analog(u16),
}

impl RawValue {
    /// Value as it is reported in telemetry.
    pub(crate) fn wire_value(&self) -> u16 {
        match self {
            RawValue::Digital(level) => u16::from(*level),
            RawValue::Analog(value) => *value,
        }
    }
}

/// A successful read and when it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SensorReading {
    pub value: RawValue,
    pub at: Instant,
}

impl SensorReading {
    pub(crate) fn new(value: RawValue) -> Self {
        Self {
            value,
            at: Instant::now(),
        }
    }

    pub(crate) fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.at)
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ReadError {
    #[error("failed to access {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected contents {contents:?} in {}", .path.display())]
    Malformed { path: PathBuf, contents: String },
    #[error("value {value} in {} exceeds ADC range", .path.display())]
    OutOfRange { path: PathBuf, value: u64 },
}

/// Anything that can be polled for a raw vibration reading.
///
/// A failed read must be reported as an error, never as a stale value.
pub(crate) trait SampleSource {
    fn sensor_id(&self) -> &str;
    fn unit(&self) -> &str;
    fn read(&mut self) -> Result<RawValue, ReadError>;
}

fn read_sysfs(path: &Path) -> Result<String, ReadError> {
    std::fs::read_to_string(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_sysfs(path: &Path, contents: &str) -> Result<(), ReadError> {
    std::fs::write(path, contents).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::{
        collections::VecDeque,
        ops::Deref,
        sync::atomic::{AtomicUsize, Ordering},
    };

    /// Replays a fixed list of reads, then reports the source as unavailable.
    pub(crate) struct ScriptedSource {
        reads: VecDeque<Result<RawValue, ()>>,
    }

    impl ScriptedSource {
        pub(crate) fn new(reads: impl IntoIterator<Item = Result<RawValue, ()>>) -> Self {
            Self {
                reads: reads.into_iter().collect(),
            }
        }
    }

    impl SampleSource for ScriptedSource {
        fn sensor_id(&self) -> &str {
            DEFAULT_SENSOR_ID
        }

        fn unit(&self) -> &str {
            "boolean"
        }

        fn read(&mut self) -> Result<RawValue, ReadError> {
            match self.reads.pop_front() {
                Some(Ok(value)) => Ok(value),
                _ => Err(unavailable()),
            }
        }
    }

    pub(crate) fn unavailable() -> ReadError {
        ReadError::Io {
            path: "/dev/null/value".into(),
            source: std::io::ErrorKind::NotFound.into(),
        }
    }

    /// Empty directory standing in for a sysfs tree, removed again on drop.
    #[derive(Debug)]
    pub(crate) struct FakeSysfs {
        dir: PathBuf,
    }

    impl Deref for FakeSysfs {
        type Target = Path;

        fn deref(&self) -> &Path {
            &self.dir
        }
    }

    impl AsRef<Path> for FakeSysfs {
        fn as_ref(&self) -> &Path {
            &self.dir
        }
    }

    impl Drop for FakeSysfs {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    pub(crate) fn fake_sysfs(name: &str) -> FakeSysfs {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let dir = std::env::temp_dir().join(format!(
            "sw420-{name}-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        FakeSysfs { dir }
    }
}
