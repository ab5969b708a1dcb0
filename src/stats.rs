use std::fmt;

/// The metric streams tracked by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricId {
	Cpu,
	Memory,
	Power,
}

impl MetricId {
	pub const ALL: [MetricId; 3] = [MetricId::Cpu, MetricId::Memory, MetricId::Power];

	const fn index(self) -> usize {
		match self {
			MetricId::Cpu => 0,
			MetricId::Memory => 1,
			MetricId::Power => 2,
		}
	}

	/// Returns the label used in the summary report
	pub fn as_str(&self) -> &'static str {
		match self {
			MetricId::Cpu => "CPU usage %",
			MetricId::Memory => "RAM used MB",
			MetricId::Power => "Watts",
		}
	}
}

/// Min/max/sum/count for one metric, updated in place
///
/// `min` and `max` start at the infinity sentinels so the first real value
/// always replaces them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats {
	pub min: f64,
	pub max: f64,
	pub sum: f64,
	pub count: u64,
}

/// Derived view of a metric with at least one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatSummary {
	pub min: f64,
	pub max: f64,
	pub avg: f64,
}

impl Default for RunningStats {
	fn default() -> Self {
		Self::new()
	}
}

impl RunningStats {
	pub const fn new() -> Self {
		Self {
			min: f64::INFINITY,
			max: f64::NEG_INFINITY,
			sum: 0.0,
			count: 0,
		}
	}

	/// Folds one value in. Non-finite values are rejected.
	pub fn observe(&mut self, value: f64) -> bool {
		if !value.is_finite() {
			return false;
		}

		if value < self.min {
			self.min = value;
		}
		if value > self.max {
			self.max = value;
		}
		self.sum += value;
		self.count += 1;
		true
	}

	pub fn is_empty(&self) -> bool {
		self.count == 0
	}

	/// `None` when nothing was observed, so "not available" can never be
	/// confused with a real reading of zero
	pub fn average(&self) -> Option<f64> {
		if self.count == 0 {
			None
		} else {
			Some(self.sum / self.count as f64)
		}
	}

	pub fn summary(&self) -> Option<StatSummary> {
		self.average().map(|avg| StatSummary {
			min: self.min,
			max: self.max,
			avg,
		})
	}
}

impl fmt::Display for StatSummary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "min {:.1} · max {:.1} · avg {:.1}", self.min, self.max, self.avg)
	}
}

/// Running statistics for every metric stream of a session
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
	stats: [RunningStats; 3],
}

impl Aggregator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records one value for `metric`; returns false if it was rejected
	pub fn observe(&mut self, metric: MetricId, value: f64) -> bool {
		let accepted = self.stats[metric.index()].observe(value);
		if !accepted {
			log::debug!("Dropping non-finite {} value {}", metric.as_str(), value);
		}
		accepted
	}

	pub fn snapshot(&self, metric: MetricId) -> RunningStats {
		self.stats[metric.index()]
	}
}
