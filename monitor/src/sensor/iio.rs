use super::{read_sysfs, RawValue, ReadError, SampleSource};
use log::info;
use std::path::{Path, PathBuf};

pub(crate) const DEFAULT_SYSFS_ROOT: &str = "/sys/bus/iio/devices";

/// SW-420 analog output sampled by an ADC exposed through the IIO subsystem.
#[derive(Debug)]
pub(crate) struct IioSysfsSource {
    sensor_id: String,
    path: PathBuf,
}

impl IioSysfsSource {
    pub(crate) fn open(
        sensor_id: impl Into<String>,
        device: u32,
        channel: u32,
        root: impl AsRef<Path>,
    ) -> Result<Self, ReadError> {
        let path = root
            .as_ref()
            .join(format!("iio:device{device}"))
            .join(format!("in_voltage{channel}_raw"));

        std::fs::metadata(&path).map_err(|source| ReadError::Io {
            path: path.clone(),
            source,
        })?;
        info!("Using ADC channel {}", path.display());

        Ok(Self {
            sensor_id: sensor_id.into(),
            path,
        })
    }
}

impl SampleSource for IioSysfsSource {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn unit(&self) -> &str {
        "ADC"
    }

    fn read(&mut self) -> Result<RawValue, ReadError> {
        let contents = read_sysfs(&self.path)?;

        let value: u64 = match contents.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                return Err(ReadError::Malformed {
                    path: self.path.clone(),
                    contents,
                })
            }
        };

        u16::try_from(value)
            .map(RawValue::Analog)
            .map_err(|_| ReadError::OutOfRange {
                path: self.path.clone(),
                value,
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sensor::test_support::{fake_sysfs, FakeSysfs};
    use std::fs;

    fn fake_adc(contents: &str) -> (FakeSysfs, IioSysfsSource) {
        let root = fake_sysfs("iio");
        fs::create_dir(root.join("iio:device0")).unwrap();
        fs::write(root.join("iio:device0/in_voltage2_raw"), contents).unwrap();

        let source = IioSysfsSource::open("adc", 0, 2, &root).unwrap();
        (root, source)
    }

    #[test]
    fn read_counts() {
        let (root, mut source) = fake_adc("31999\n");
        assert_eq!(source.read().unwrap(), RawValue::Analog(31999));

        fs::write(root.join("iio:device0/in_voltage2_raw"), "65535\n").unwrap();
        assert_eq!(source.read().unwrap(), RawValue::Analog(65535));

        assert_eq!(source.sensor_id(), "adc");
        assert_eq!(source.unit(), "ADC");
    }

    #[test]
    fn read_out_of_range() {
        let (_root, mut source) = fake_adc("65536\n");
        assert!(matches!(
            source.read(),
            Err(ReadError::OutOfRange { value: 65536, .. })
        ));
    }

    #[test]
    fn read_garbage() {
        let (_root, mut source) = fake_adc("-12\n");
        assert!(matches!(source.read(), Err(ReadError::Malformed { .. })));
    }

    #[test]
    fn channel_vanishes() {
        let (root, mut source) = fake_adc("100\n");
        fs::remove_file(root.join("iio:device0/in_voltage2_raw")).unwrap();
        assert!(matches!(source.read(), Err(ReadError::Io { .. })));
    }

    #[test]
    fn open_missing_channel() {
        let root = fake_sysfs("iio");
        assert!(matches!(
            IioSysfsSource::open("adc", 1, 0, &root),
            Err(ReadError::Io { .. })
        ));
    }
}
