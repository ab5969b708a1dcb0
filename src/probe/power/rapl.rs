use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::constants::MICRO;
use crate::probe::power::PowerReader;
use crate::util::{average_watts, counter_delta};

/// A cumulative hardware energy counter
pub trait EnergyCounter: Debug + Send {
	/// Raw counter values, one per metered domain
	fn read_raw(&self) -> io::Result<Vec<u64>>;

	/// Joules represented by `delta` counts on `domain`
	fn joules(&self, domain: usize, delta: u64) -> f64;

	/// Count at which the counter of `domain` wraps back to zero, if known
	fn range(&self, domain: usize) -> Option<u64>;
}

/// Last reading of an energy counter and when it was taken
#[derive(Debug, Clone)]
struct CounterState {
	raw: Vec<u64>,
	at: Instant,
}

/// Turns an energy counter into average watts over each interval
///
/// The first reading only sets the baseline.
#[derive(Debug)]
pub struct EnergyRegisterReader<C> {
	counter: C,
	baseline: Option<CounterState>,
}

impl<C: EnergyCounter> EnergyRegisterReader<C> {
	pub fn new(counter: C) -> Self {
		Self {
			counter,
			baseline: None,
		}
	}

	/// Reads the counter as of `now` and returns the average power since the
	/// previous reading
	///
	/// A counter that went backwards without a known range is a reset, not a
	/// wrap, and gives no data for that interval.
	pub fn sample_at(&mut self, now: Instant) -> Option<f64> {
		let raw = match self.counter.read_raw() {
			Ok(raw) => raw,
			Err(e) => {
				log::debug!("Energy counter read failed: {}", e);
				return None;
			},
		};

		let previous = self.baseline.replace(CounterState { raw: raw.clone(), at: now })?;
		if previous.raw.len() != raw.len() {
			return None;
		}

		let joules: f64 = previous
			.raw
			.iter()
			.zip(&raw)
			.enumerate()
			.map(|(domain, (&start, &end))| {
				let delta = match self.counter.range(domain) {
					Some(range) => counter_delta(start, end, range),
					None => end.checked_sub(start)?,
				};
				Some(self.counter.joules(domain, delta))
			})
			.sum::<Option<f64>>()?;

		average_watts(joules, now.saturating_duration_since(previous.at))
	}
}

impl<C: EnergyCounter> PowerReader for EnergyRegisterReader<C> {
	fn prime(&mut self) {
		let _ = self.sample_at(Instant::now());
	}

	fn read_watts(&mut self) -> Option<f64> {
		self.sample_at(Instant::now())
	}
}

/// One package zone of the powercap tree
#[derive(Debug, Clone)]
struct PowercapZone {
	energy_path: PathBuf,
	/// `None` when the zone does not publish `max_energy_range_uj`
	range_uj: Option<u64>,
}

/// Package energy counters exposed under /sys/class/powercap
#[derive(Debug)]
pub struct PowercapCounter {
	zones: Vec<PowercapZone>,
}

impl PowercapCounter {
	/// Finds the top-level `intel-rapl:N` zones under `base`
	///
	/// Sub-zones (`intel-rapl:N:M`) are part of their package and skipped.
	pub fn open(base: &Path) -> io::Result<Self> {
		let mut names: Vec<String> = fs::read_dir(base)?
			.filter_map(Result::ok)
			.map(|entry| entry.file_name().to_string_lossy().into_owned())
			.filter(|name| is_package_zone(name))
			.collect();
		names.sort();

		let mut zones = Vec::new();
		for name in names {
			let dir = base.join(&name);
			let range_uj = fs::read_to_string(dir.join("max_energy_range_uj"))
				.ok()
				.and_then(|s| s.trim().parse::<u64>().ok())
				.map(|max| max.saturating_add(1));

			zones.push(PowercapZone {
				energy_path: dir.join("energy_uj"),
				range_uj,
			});
		}

		if zones.is_empty() {
			return Err(io::Error::new(
				io::ErrorKind::NotFound,
				format!("no RAPL zones under {}", base.display()),
			));
		}

		let counter = Self { zones };
		// energy_uj is root-only on most current kernels
		counter.read_raw()?;
		Ok(counter)
	}
}

fn is_package_zone(name: &str) -> bool {
	name.strip_prefix("intel-rapl:")
		.is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

impl EnergyCounter for PowercapCounter {
	fn read_raw(&self) -> io::Result<Vec<u64>> {
		self.zones
			.iter()
			.map(|zone| {
				fs::read_to_string(&zone.energy_path)?
					.trim()
					.parse::<u64>()
					.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
			})
			.collect()
	}

	fn joules(&self, _domain: usize, delta: u64) -> f64 {
		delta as f64 / MICRO
	}

	fn range(&self, domain: usize) -> Option<u64> {
		self.zones.get(domain).and_then(|zone| zone.range_uj)
	}
}
