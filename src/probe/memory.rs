use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sysinfo::System;

use crate::constants::{BYTES_PER_MB, KB_PER_MB, PROC_MEMINFO_PATH};
use crate::probe::Probe;

/// The /proc/meminfo fields needed to compute used memory, in kB
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
	pub total: u64,
	pub available: Option<u64>,
	pub free: u64,
	pub buffers: u64,
	pub cached: u64,
}

impl MemInfo {
	/// Parses /proc/meminfo content. Fields that are absent read as zero.
	pub fn parse(content: &str) -> Self {
		let mut info = MemInfo::default();

		for line in content.lines() {
			let mut parts = line.split_whitespace();
			let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
				continue;
			};
			let value = value.parse().unwrap_or(0);

			match key {
				"MemTotal:" => info.total = value,
				"MemAvailable:" => info.available = Some(value),
				"MemFree:" => info.free = value,
				"Buffers:" => info.buffers = value,
				"Cached:" => info.cached = value,
				_ => {},
			}
		}

		info
	}

	/// Used memory in MB, total minus available
	///
	/// Older kernels lack `MemAvailable`; free + buffers + cache stands in.
	pub fn used_mb(&self) -> f64 {
		let available = self
			.available
			.unwrap_or(self.free + self.buffers + self.cached);
		self.total.saturating_sub(available) as f64 / KB_PER_MB
	}
}

/// Used memory from /proc/meminfo
#[derive(Debug)]
pub struct MeminfoProbe {
	path: PathBuf,
}

impl MeminfoProbe {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	fn read(&self) -> io::Result<MemInfo> {
		fs::read_to_string(&self.path).map(|content| MemInfo::parse(&content))
	}
}

impl Probe for MeminfoProbe {
	fn name(&self) -> &str {
		"/proc/meminfo"
	}

	fn sample(&mut self) -> Option<f64> {
		match self.read() {
			Ok(info) => Some(info.used_mb()),
			Err(e) => {
				log::debug!("Memory read failed: {}", e);
				None
			},
		}
	}
}

/// Used memory through `sysinfo`
#[derive(Debug)]
pub struct SysinfoMemoryProbe {
	system: System,
}

impl SysinfoMemoryProbe {
	pub fn new() -> Self {
		Self { system: System::new() }
	}
}

impl Default for SysinfoMemoryProbe {
	fn default() -> Self {
		Self::new()
	}
}

impl Probe for SysinfoMemoryProbe {
	fn name(&self) -> &str {
		"sysinfo"
	}

	fn sample(&mut self) -> Option<f64> {
		self.system.refresh_memory();

		let total = self.system.total_memory();
		let available = match self.system.available_memory() {
			0 => self.system.free_memory(),
			available => available,
		};
		Some(total.saturating_sub(available) as f64 / BYTES_PER_MB)
	}
}

/// Picks the memory probe for this platform
pub fn select_memory_probe() -> Box<dyn Probe> {
	if cfg!(target_os = "linux") && Path::new(PROC_MEMINFO_PATH).exists() {
		return Box::new(MeminfoProbe::new(PROC_MEMINFO_PATH));
	}
	Box::new(SysinfoMemoryProbe::new())
}
