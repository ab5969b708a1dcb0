pub mod battery;
pub mod msr;
pub mod powermetrics;
pub mod rapl;
pub mod system_battery;

use std::fmt::Debug;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::constants::{POWERCAP_PATH, POWER_SUPPLY_PATH};
use crate::probe::Probe;
use crate::probe::power::battery::BatteryReader;
use crate::probe::power::msr::MsrEnergyCounter;
use crate::probe::power::powermetrics::PowermetricsReader;
use crate::probe::power::rapl::{EnergyRegisterReader, PowercapCounter};
use crate::probe::power::system_battery::SystemBatteryReader;

/// Trait for the different ways of obtaining a power reading
pub trait PowerReader: Debug + Send {
	/// Takes the baseline reading for counter-based sources
	fn prime(&mut self) {}

	/// Average or instantaneous draw in watts, `None` if unknown this tick
	fn read_watts(&mut self) -> Option<f64>;
}

/// What to do when a power source exists but needs elevated privileges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PrivilegePolicy {
	/// Log at debug level only
	#[default]
	Silent,
	/// Log one warning per denied source at startup
	Warn,
}

/// Power acquisition strategies, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSourceKind {
	/// macOS `powermetrics` instantaneous package power
	Powermetrics,
	/// Linux powercap RAPL energy counters
	Powercap,
	/// RAPL energy status MSR read through /dev/cpu/0/msr
	RaplMsr,
	/// Battery discharge current times voltage
	Battery,
	/// Battery discharge rate from the OS battery API
	SystemBattery,
}

impl PowerSourceKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			PowerSourceKind::Powermetrics => "powermetrics",
			PowerSourceKind::Powercap => "RAPL (powercap)",
			PowerSourceKind::RaplMsr => "RAPL (MSR)",
			PowerSourceKind::Battery => "battery",
			PowerSourceKind::SystemBattery => "battery (OS)",
		}
	}

	/// Candidate sources for this platform, highest priority first
	pub fn candidates() -> &'static [PowerSourceKind] {
		if cfg!(target_os = "macos") {
			&[PowerSourceKind::Powermetrics, PowerSourceKind::SystemBattery]
		} else if cfg!(target_os = "linux") {
			&[
				PowerSourceKind::Powercap,
				PowerSourceKind::RaplMsr,
				PowerSourceKind::Battery,
			]
		} else {
			&[PowerSourceKind::SystemBattery]
		}
	}

	/// Opens the source, failing if it is missing or not permitted
	pub fn open(&self, probe_timeout: Duration) -> io::Result<Box<dyn PowerReader>> {
		match self {
			PowerSourceKind::Powermetrics => Ok(Box::new(PowermetricsReader::open(probe_timeout)?)),
			PowerSourceKind::Powercap => {
				let counter = PowercapCounter::open(Path::new(POWERCAP_PATH))?;
				Ok(Box::new(EnergyRegisterReader::new(counter)))
			},
			PowerSourceKind::RaplMsr => {
				let counter = MsrEnergyCounter::open()?;
				Ok(Box::new(EnergyRegisterReader::new(counter)))
			},
			PowerSourceKind::Battery => Ok(Box::new(BatteryReader::open(Path::new(POWER_SUPPLY_PATH))?)),
			PowerSourceKind::SystemBattery => Ok(Box::new(SystemBatteryReader::open()?)),
		}
	}
}

/// Power probe backed by the first source that could be opened
///
/// With no source every tick is absent; that is an expected outcome on
/// many machines, not an error.
#[derive(Debug)]
pub struct PowerProbe {
	source: Option<PowerSourceKind>,
	reader: Option<Box<dyn PowerReader>>,
}

impl PowerProbe {
	/// Tries this platform's candidate sources in order
	pub fn detect(policy: PrivilegePolicy, probe_timeout: Duration) -> Self {
		Self::select(PowerSourceKind::candidates(), policy, |kind| kind.open(probe_timeout))
	}

	/// Tries `candidates` in order with `open`, keeping the first success
	pub fn select<F>(candidates: &[PowerSourceKind], policy: PrivilegePolicy, mut open: F) -> Self
	where
		F: FnMut(PowerSourceKind) -> io::Result<Box<dyn PowerReader>>,
	{
		for &kind in candidates {
			match open(kind) {
				Ok(reader) => {
					log::info!("Power source: {}", kind.as_str());
					return Self::with_reader(kind, reader);
				},
				Err(e) if e.kind() == io::ErrorKind::PermissionDenied => match policy {
					PrivilegePolicy::Warn => log::warn!(
						"{} needs elevated privileges ({}), skipping it",
						kind.as_str(),
						e
					),
					PrivilegePolicy::Silent => log::debug!("{} not permitted: {}", kind.as_str(), e),
				},
				Err(e) => log::debug!("{} unavailable: {}", kind.as_str(), e),
			}
		}

		log::info!("No power source available, power will be reported as not available");
		Self::absent()
	}

	pub fn with_reader(kind: PowerSourceKind, reader: Box<dyn PowerReader>) -> Self {
		Self {
			source: Some(kind),
			reader: Some(reader),
		}
	}

	pub fn absent() -> Self {
		Self {
			source: None,
			reader: None,
		}
	}

	pub fn source(&self) -> Option<PowerSourceKind> {
		self.source
	}
}

impl Probe for PowerProbe {
	fn name(&self) -> &str {
		self.source.map_or("none", |kind| kind.as_str())
	}

	fn prime(&mut self) {
		if let Some(reader) = self.reader.as_mut() {
			reader.prime();
		}
	}

	fn sample(&mut self) -> Option<f64> {
		let watts = self.reader.as_mut()?.read_watts()?;
		if watts.is_finite() && watts >= 0.0 {
			Some(watts)
		} else {
			log::debug!("Discarding implausible power reading {}", watts);
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug)]
	struct Constant(f64);

	impl PowerReader for Constant {
		fn read_watts(&mut self) -> Option<f64> {
			Some(self.0)
		}
	}

	fn denied() -> io::Error {
		io::Error::new(io::ErrorKind::PermissionDenied, "root only")
	}

	#[test]
	fn first_openable_source_wins() {
		let mut tried = Vec::new();
		let probe = PowerProbe::select(
			&[
				PowerSourceKind::Powercap,
				PowerSourceKind::RaplMsr,
				PowerSourceKind::Battery,
			],
			PrivilegePolicy::Warn,
			|kind| {
				tried.push(kind);
				match kind {
					PowerSourceKind::Powercap => Err(denied()),
					_ => Ok(Box::new(Constant(12.5)) as Box<dyn PowerReader>),
				}
			},
		);

		assert_eq!(tried, vec![PowerSourceKind::Powercap, PowerSourceKind::RaplMsr]);
		assert_eq!(probe.source(), Some(PowerSourceKind::RaplMsr));
		assert_eq!(probe.name(), "RAPL (MSR)");
	}

	#[cfg(target_os = "linux")]
	#[test]
	fn linux_prefers_energy_counters_over_battery() {
		assert_eq!(
			PowerSourceKind::candidates(),
			&[
				PowerSourceKind::Powercap,
				PowerSourceKind::RaplMsr,
				PowerSourceKind::Battery,
			]
		);
	}

	#[cfg(target_os = "macos")]
	#[test]
	fn macos_falls_back_to_battery_after_powermetrics() {
		assert_eq!(
			PowerSourceKind::candidates(),
			&[PowerSourceKind::Powermetrics, PowerSourceKind::SystemBattery]
		);
	}

	#[cfg(windows)]
	#[test]
	fn windows_uses_battery_api() {
		assert_eq!(PowerSourceKind::candidates(), &[PowerSourceKind::SystemBattery]);
	}

	#[test]
	fn every_platform_has_a_power_candidate() {
		assert!(!PowerSourceKind::candidates().is_empty());
	}

	#[test]
	fn battery_fallback_is_tried_last() {
		let mut tried = Vec::new();
		let probe = PowerProbe::select(
			&[PowerSourceKind::Powermetrics, PowerSourceKind::SystemBattery],
			PrivilegePolicy::Silent,
			|kind| {
				tried.push(kind);
				match kind {
					PowerSourceKind::Powermetrics => Err(denied()),
					_ => Ok(Box::new(Constant(9.0)) as Box<dyn PowerReader>),
				}
			},
		);

		assert_eq!(
			tried,
			vec![PowerSourceKind::Powermetrics, PowerSourceKind::SystemBattery]
		);
		assert_eq!(probe.name(), "battery (OS)");
	}

	#[test]
	fn no_source_is_absent_every_tick() {
		let mut probe = PowerProbe::select(&[PowerSourceKind::Battery], PrivilegePolicy::Silent, |_| {
			Err(io::Error::new(io::ErrorKind::NotFound, "no battery"))
		});

		probe.prime();
		assert_eq!(probe.source(), None);
		assert_eq!(probe.name(), "none");
		for _ in 0..3 {
			assert_eq!(probe.sample(), None);
		}
	}

	#[test]
	fn implausible_readings_are_dropped() {
		let mut probe = PowerProbe::with_reader(PowerSourceKind::Battery, Box::new(Constant(-4.0)));
		assert_eq!(probe.sample(), None);

		let mut probe = PowerProbe::with_reader(PowerSourceKind::Battery, Box::new(Constant(f64::NAN)));
		assert_eq!(probe.sample(), None);
	}
}
