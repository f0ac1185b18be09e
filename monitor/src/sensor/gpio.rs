use super::{read_sysfs, write_sysfs, RawValue, ReadError, SampleSource};
use log::{debug, info, warn};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub(crate) const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";
pub(crate) const DEFAULT_PIN: u32 = 4;

/// Time given to udev to set up the pin directory after an export.
const EXPORT_SETTLE_TIME: Duration = Duration::from_millis(100);

/// SW-420 digital output read through the legacy GPIO sysfs interface.
#[derive(Debug)]
pub(crate) struct GpioSysfsSource {
    sensor_id: String,
    pin: u32,
    root: PathBuf,
    value_path: PathBuf,
    exported: bool,
}

impl GpioSysfsSource {
    /// Exports `pin` (unless it already is) and configures it as an input.
    pub(crate) async fn open(
        sensor_id: impl Into<String>,
        pin: u32,
        root: impl AsRef<Path>,
    ) -> Result<Self, ReadError> {
        let root = root.as_ref().to_path_buf();
        let pin_dir = root.join(format!("gpio{pin}"));

        let exported = if pin_dir.exists() {
            debug!("GPIO {pin} already exported");
            false
        } else {
            write_sysfs(&root.join("export"), &pin.to_string())?;
            tokio::time::sleep(EXPORT_SETTLE_TIME).await;
            true
        };

        // Built before configuring direction so a failure below still unexports the pin.
        let source = Self {
            sensor_id: sensor_id.into(),
            pin,
            root,
            value_path: pin_dir.join("value"),
            exported,
        };

        write_sysfs(&pin_dir.join("direction"), "in")?;
        info!("GPIO {} configured as input", source.pin);

        Ok(source)
    }
}

impl SampleSource for GpioSysfsSource {
    fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    fn unit(&self) -> &str {
        "boolean"
    }

    fn read(&mut self) -> Result<RawValue, ReadError> {
        let contents = read_sysfs(&self.value_path)?;

        match contents.trim() {
            "0" => Ok(RawValue::Digital(false)),
            "1" => Ok(RawValue::Digital(true)),
            _ => Err(ReadError::Malformed {
                path: self.value_path.clone(),
                contents,
            }),
        }
    }
}

impl Drop for GpioSysfsSource {
    fn drop(&mut self) {
        if self.exported {
            if let Err(e) = write_sysfs(&self.root.join("unexport"), &self.pin.to_string()) {
                warn!("Failed to unexport GPIO {}: {e}", self.pin);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sensor::test_support::{fake_sysfs, FakeSysfs};
    use std::fs;

    fn fake_exported_pin(pin: u32) -> FakeSysfs {
        let root = fake_sysfs("gpio");
        fs::create_dir(root.join(format!("gpio{pin}"))).unwrap();
        root
    }

    #[tokio::test]
    async fn read_levels() {
        let root = fake_exported_pin(4);
        let mut source = GpioSysfsSource::open("test", 4, &root).await.unwrap();

        assert_eq!(
            fs::read_to_string(root.join("gpio4/direction")).unwrap(),
            "in"
        );
        assert_eq!(source.value_path, root.join("gpio4/value"));

        fs::write(root.join("gpio4/value"), "1\n").unwrap();
        assert_eq!(source.read().unwrap(), RawValue::Digital(true));

        fs::write(root.join("gpio4/value"), "0\n").unwrap();
        assert_eq!(source.read().unwrap(), RawValue::Digital(false));

        assert_eq!(source.sensor_id(), "test");
        assert_eq!(source.unit(), "boolean");
    }

    #[tokio::test]
    async fn read_garbage() {
        let root = fake_exported_pin(17);
        let mut source = GpioSysfsSource::open("test", 17, &root).await.unwrap();

        fs::write(root.join("gpio17/value"), "x\n").unwrap();
        assert!(matches!(
            source.read(),
            Err(ReadError::Malformed { contents, .. }) if contents == "x\n"
        ));
    }

    #[tokio::test]
    async fn read_missing_value() {
        let root = fake_exported_pin(4);
        let mut source = GpioSysfsSource::open("test", 4, &root).await.unwrap();

        assert!(matches!(source.read(), Err(ReadError::Io { .. })));
    }

    #[tokio::test]
    async fn already_exported_pin_is_left_exported() {
        let root = fake_exported_pin(4);
        drop(GpioSysfsSource::open("test", 4, &root).await.unwrap());

        assert!(!root.join("export").exists());
        assert!(!root.join("unexport").exists());
    }

    #[tokio::test]
    async fn failed_setup_unexports() {
        let root = fake_sysfs("gpio");

        // The fake tree never grows a pin directory after export
        let ret = GpioSysfsSource::open("test", 5, &root).await;
        assert!(matches!(
            ret,
            Err(ReadError::Io { path, .. }) if path == root.join("gpio5/direction")
        ));

        assert_eq!(fs::read_to_string(root.join("export")).unwrap(), "5");
        assert_eq!(fs::read_to_string(root.join("unexport")).unwrap(), "5");
    }

    #[tokio::test(start_paused = true)]
    async fn export_waits_for_udev_without_blocking() {
        let root = fake_sysfs("gpio");
        let start = tokio::time::Instant::now();

        let _ = GpioSysfsSource::open("test", 6, &root).await;

        // Paused time only advances through the runtime's timers
        assert!(start.elapsed() >= EXPORT_SETTLE_TIME);
    }
}
