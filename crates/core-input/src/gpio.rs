//! Sysfs GPIO line reader for the two kiosk buttons.
//!
//! The value files are reopened on every poll, so a line re-exported
//! between ticks is picked up without a restart.

use crate::ButtonSource;
use crate::edge::BUTTON_COUNT;
use anyhow::Context;
use std::fs;
use std::path::PathBuf;

pub struct SysfsButtonSource {
    value_paths: [PathBuf; BUTTON_COUNT],
}

impl SysfsButtonSource {
    /// `pins` are BCM line numbers. Kiosk wiring: channel 0 (pin 10) is the
    /// right-hand button, channel 1 (pin 4) the left.
    pub fn new(pins: [u32; BUTTON_COUNT]) -> Self {
        Self::from_paths(
            pins.map(|pin| PathBuf::from(format!("/sys/class/gpio/gpio{pin}/value"))),
        )
    }

    fn from_paths(value_paths: [PathBuf; BUTTON_COUNT]) -> Self {
        Self { value_paths }
    }

    /// Best-effort export of both lines as inputs. Lines that are already
    /// exported make the write fail with EBUSY, which is not a problem.
    pub fn export(pins: [u32; BUTTON_COUNT]) {
        for pin in pins {
            let _ = fs::write("/sys/class/gpio/export", pin.to_string());
            let _ = fs::write(format!("/sys/class/gpio/gpio{pin}/direction"), "in");
        }
    }
}

impl ButtonSource for SysfsButtonSource {
    fn read(&mut self, channel: usize) -> anyhow::Result<bool> {
        let path = self
            .value_paths
            .get(channel)
            .with_context(|| format!("no such button channel: {channel}"))?;
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(raw.trim() == "1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_levels_from_value_files() {
        let dir = tempfile::tempdir().unwrap();
        let high = dir.path().join("gpio10_value");
        let low = dir.path().join("gpio4_value");
        fs::write(&high, "1\n").unwrap();
        fs::write(&low, "0\n").unwrap();

        let mut source = SysfsButtonSource::from_paths([high, low]);
        assert!(source.read(0).unwrap());
        assert!(!source.read(1).unwrap());
    }

    #[test]
    fn missing_value_file_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        let mut source = SysfsButtonSource::from_paths([gone.clone(), gone]);
        assert!(source.read(0).is_err());
    }

    #[test]
    fn out_of_range_channel_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("v");
        fs::write(&p, "0").unwrap();
        let mut source = SysfsButtonSource::from_paths([p.clone(), p]);
        assert!(source.read(2).is_err());
    }
}
