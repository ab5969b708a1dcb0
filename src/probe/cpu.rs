use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use sysinfo::System;

use crate::constants::PROC_STAT_PATH;
use crate::probe::Probe;

/// Cumulative tick counters for all CPUs, as reported by /proc/stat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStats {
	pub user: u64,
	pub nice: u64,
	pub system: u64,
	pub idle: u64,
	pub iowait: u64,
	pub irq: u64,
	pub softirq: u64,
	pub steal: u64,
	pub total: u64,
}

impl CpuStats {
	/// Parses a `cpu` line of /proc/stat. Missing trailing fields count as zero.
	pub fn parse_line(line: &str) -> Option<Self> {
		let mut parts = line.split_whitespace();
		if !parts.next()?.starts_with("cpu") {
			return None;
		}

		let fields: Vec<u64> = parts.map(|p| p.parse().unwrap_or(0)).collect();
		if fields.len() < 4 {
			return None;
		}
		let field = |i: usize| fields.get(i).copied().unwrap_or(0);

		let stats = CpuStats {
			user: field(0),
			nice: field(1),
			system: field(2),
			idle: field(3),
			iowait: field(4),
			irq: field(5),
			softirq: field(6),
			steal: field(7),
			total: 0,
		};

		// guest time is already folded into user/nice
		let total = stats.user
			+ stats.nice + stats.system
			+ stats.idle + stats.iowait
			+ stats.irq + stats.softirq
			+ stats.steal;

		Some(CpuStats { total, ..stats })
	}

	/// Ticks spent doing anything other than waiting
	pub fn busy(&self) -> u64 {
		self.total.saturating_sub(self.idle + self.iowait)
	}
}

/// Reads the aggregate `cpu ` line from a /proc/stat formatted file
pub fn read_aggregate_stats(path: &Path) -> io::Result<CpuStats> {
	let file = fs::File::open(path)?;
	let reader = BufReader::new(file);

	for line in reader.lines() {
		let line = line?;
		if line.starts_with("cpu ") {
			return CpuStats::parse_line(&line)
				.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed cpu line"));
		}
	}

	Err(io::Error::new(
		io::ErrorKind::NotFound,
		format!("no aggregate cpu line in {}", path.display()),
	))
}

/// Utilization in percent between two readings
///
/// `None` when the counters did not advance or went backwards.
pub fn utilization_between(prev: &CpuStats, current: &CpuStats) -> Option<f64> {
	if current.total < prev.total {
		return None;
	}
	let total_diff = current.total - prev.total;
	if total_diff == 0 {
		return None;
	}

	let busy_diff = current.busy().saturating_sub(prev.busy());
	Some(busy_diff as f64 / total_diff as f64 * 100.0)
}

/// CPU utilization from the tick counters in /proc/stat
#[derive(Debug)]
pub struct ProcStatCpuProbe {
	path: PathBuf,
	prev_stats: Option<CpuStats>,
}

impl ProcStatCpuProbe {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			prev_stats: None,
		}
	}
}

impl Probe for ProcStatCpuProbe {
	fn name(&self) -> &str {
		"/proc/stat"
	}

	fn prime(&mut self) {
		match read_aggregate_stats(&self.path) {
			Ok(stats) => self.prev_stats = Some(stats),
			Err(e) => log::debug!("CPU baseline read failed: {}", e),
		}
	}

	fn sample(&mut self) -> Option<f64> {
		let current = match read_aggregate_stats(&self.path) {
			Ok(stats) => stats,
			Err(e) => {
				log::debug!("CPU read failed: {}", e);
				return None;
			},
		};

		let Some(prev) = self.prev_stats else {
			// First reading only establishes the baseline
			self.prev_stats = Some(current);
			return None;
		};

		if current.total < prev.total {
			log::debug!("CPU counters went backwards, resetting baseline");
			self.prev_stats = Some(current);
			return None;
		}

		let utilization = utilization_between(&prev, &current);
		if utilization.is_some() {
			self.prev_stats = Some(current);
		}
		utilization
	}
}

/// CPU utilization through `sysinfo`, for platforms without /proc/stat
#[derive(Debug)]
pub struct SysinfoCpuProbe {
	system: System,
	primed: bool,
}

impl SysinfoCpuProbe {
	pub fn new() -> Self {
		Self {
			system: System::new(),
			primed: false,
		}
	}
}

impl Default for SysinfoCpuProbe {
	fn default() -> Self {
		Self::new()
	}
}

impl Probe for SysinfoCpuProbe {
	fn name(&self) -> &str {
		"sysinfo"
	}

	fn prime(&mut self) {
		self.system.refresh_cpu_usage();
		self.primed = true;
	}

	fn sample(&mut self) -> Option<f64> {
		self.system.refresh_cpu_usage();
		if !self.primed {
			self.primed = true;
			return None;
		}

		let usage = f64::from(self.system.global_cpu_usage());
		usage.is_finite().then_some(usage)
	}
}

/// Reports a constant when the platform has no usable CPU counter
#[derive(Debug)]
pub struct FixedCpuProbe {
	value: f64,
}

impl FixedCpuProbe {
	pub fn new(value: f64) -> Self {
		Self { value }
	}
}

impl Probe for FixedCpuProbe {
	fn name(&self) -> &str {
		"unavailable (fixed 0)"
	}

	fn sample(&mut self) -> Option<f64> {
		Some(self.value)
	}
}

/// Picks the CPU probe for this platform
pub fn select_cpu_probe() -> Box<dyn Probe> {
	if cfg!(target_os = "linux") {
		match read_aggregate_stats(Path::new(PROC_STAT_PATH)) {
			Ok(_) => return Box::new(ProcStatCpuProbe::new(PROC_STAT_PATH)),
			Err(e) => log::debug!("{} unusable: {}", PROC_STAT_PATH, e),
		}
	}

	if sysinfo::IS_SUPPORTED_SYSTEM {
		return Box::new(SysinfoCpuProbe::new());
	}

	log::warn!("No CPU counter on this platform, CPU usage will read 0");
	Box::new(FixedCpuProbe::new(0.0))
}
