use std::io;

use starship_battery::units::energy::watt_hour;
use starship_battery::units::power::watt;
use starship_battery::units::time::second;
use starship_battery::{Battery, Manager, State};

use crate::constants::SECONDS_PER_HOUR;
use crate::probe::power::PowerReader;

/// Battery discharge rate from the operating system's battery API
///
/// Used where there is no sysfs power_supply tree (Windows, macOS without
/// powermetrics). Only yields a value while running on battery.
#[derive(Debug)]
pub struct SystemBatteryReader {
	index: usize,
}

impl SystemBatteryReader {
	/// Picks the first battery the OS reports
	pub fn open() -> io::Result<Self> {
		let manager = Manager::new().map_err(battery_error)?;
		let found = manager
			.batteries()
			.map_err(battery_error)?
			.position(|battery| battery.is_ok());

		match found {
			Some(index) => Ok(Self { index }),
			None => Err(io::Error::new(io::ErrorKind::NotFound, "no battery reported by the OS")),
		}
	}

	fn read(&self) -> io::Result<Battery> {
		// The manager is not Send, so it is rebuilt for each reading
		let manager = Manager::new().map_err(battery_error)?;
		manager
			.batteries()
			.map_err(battery_error)?
			.nth(self.index)
			.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "battery disappeared"))?
			.map_err(battery_error)
	}
}

impl PowerReader for SystemBatteryReader {
	fn read_watts(&mut self) -> Option<f64> {
		let battery = match self.read() {
			Ok(battery) => battery,
			Err(e) => {
				log::debug!("Battery read failed: {}", e);
				return None;
			},
		};

		discharge_watts(
			battery.state(),
			battery.energy_rate().get::<watt>(),
			battery.energy().get::<watt_hour>(),
			battery.time_to_empty().map(|time| time.get::<second>()),
		)
	}
}

/// Power drawn from a battery, `None` unless it is discharging
///
/// Some drivers report a zero rate; the draw is then estimated from the
/// remaining energy and the OS's time-to-empty.
pub fn discharge_watts(state: State, rate_w: f32, remaining_wh: f32, secs_to_empty: Option<f32>) -> Option<f64> {
	if state != State::Discharging {
		return None;
	}

	let rate = f64::from(rate_w).abs();
	if rate > 0.0 {
		return Some(rate);
	}

	let secs = f64::from(secs_to_empty?);
	if secs <= 0.0 {
		return None;
	}
	Some(f64::from(remaining_wh) / (secs / SECONDS_PER_HOUR))
}

fn battery_error(e: starship_battery::Error) -> io::Error {
	io::Error::other(e.to_string())
}
