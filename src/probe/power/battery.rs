use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::constants::MICRO;
use crate::probe::power::PowerReader;

/// System draw estimated from a discharging battery
///
/// Uses `power_now` (µW) when the driver provides it, otherwise
/// `current_now` (µA) × `voltage_now` (µV). While on mains the battery
/// says nothing about system draw, so those ticks are absent.
#[derive(Debug)]
pub struct BatteryReader {
	dir: PathBuf,
}

impl BatteryReader {
	/// Picks the first battery under a /sys/class/power_supply style tree
	pub fn open(base: &Path) -> io::Result<Self> {
		let mut dirs: Vec<PathBuf> = fs::read_dir(base)?
			.filter_map(Result::ok)
			.map(|entry| entry.path())
			.filter(|dir| is_battery(dir) && has_power_fields(dir))
			.collect();
		dirs.sort();

		dirs.into_iter()
			.next()
			.map(|dir| Self { dir })
			.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no battery with power telemetry"))
	}

	fn read_value(&self, name: &str) -> Option<i64> {
		fs::read_to_string(self.dir.join(name)).ok()?.trim().parse().ok()
	}
}

fn is_battery(dir: &Path) -> bool {
	match fs::read_to_string(dir.join("type")) {
		Ok(kind) => kind.trim() == "Battery",
		Err(_) => dir
			.file_name()
			.is_some_and(|name| name.to_string_lossy().starts_with("BAT")),
	}
}

fn has_power_fields(dir: &Path) -> bool {
	dir.join("power_now").exists() || (dir.join("current_now").exists() && dir.join("voltage_now").exists())
}

impl PowerReader for BatteryReader {
	fn read_watts(&mut self) -> Option<f64> {
		let status = fs::read_to_string(self.dir.join("status")).unwrap_or_default();
		if status.trim() != "Discharging" {
			return None;
		}

		// Some drivers report discharge as a negative current
		if let Some(power_uw) = self.read_value("power_now") {
			return Some(power_uw.unsigned_abs() as f64 / MICRO);
		}

		let current_ua = self.read_value("current_now")?;
		let voltage_uv = self.read_value("voltage_now")?;
		Some((current_ua.unsigned_abs() as f64 / MICRO) * (voltage_uv.unsigned_abs() as f64 / MICRO))
	}
}
