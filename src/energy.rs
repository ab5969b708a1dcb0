use crate::constants::SECONDS_PER_HOUR;

/// Cumulative energy drawn over a session
///
/// Power is treated as constant across each tick, so every reading adds
/// `power_w * elapsed_s` joules. Ticks without a power reading add nothing.
#[derive(Debug, Clone, Default)]
pub struct EnergyIntegrator {
	/// Total energy in joules, never decreases
	total_joules: f64,

	/// Number of intervals that contributed to the total
	intervals: u64,
}

impl EnergyIntegrator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds the energy of one interval
	///
	/// Negative or non-finite inputs are ignored and reported as `false`.
	pub fn integrate(&mut self, power_w: f64, elapsed_s: f64) -> bool {
		if !power_w.is_finite() || !elapsed_s.is_finite() || power_w < 0.0 || elapsed_s < 0.0 {
			log::debug!("Skipping energy interval: {} W over {} s", power_w, elapsed_s);
			return false;
		}

		self.total_joules += power_w * elapsed_s;
		self.intervals += 1;
		true
	}

	/// Total energy in joules
	pub fn total(&self) -> f64 {
		self.total_joules
	}

	pub fn watt_hours(&self) -> f64 {
		self.total_joules / SECONDS_PER_HOUR
	}

	/// True when no interval had a power reading
	pub fn is_empty(&self) -> bool {
		self.intervals == 0
	}

	/// The total, or `None` when power was never available
	pub fn total_if_measured(&self) -> Option<f64> {
		if self.is_empty() { None } else { Some(self.total_joules) }
	}
}
