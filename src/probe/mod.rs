pub mod cpu;
pub mod memory;
pub mod power;

use std::fmt::Debug;
use std::time::Duration;

use crate::probe::power::{PowerProbe, PrivilegePolicy};

/// A source of one metric stream, read once per tick
///
/// Implementations are chosen once at startup for the current platform.
/// A probe never fails the session: anything it cannot read this tick
/// comes back as `None`.
pub trait Probe: Debug + Send {
	/// Short description of where readings come from
	fn name(&self) -> &str;

	/// Takes the baseline reading for counter-based probes
	///
	/// Instantaneous probes have nothing to prepare.
	fn prime(&mut self) {}

	/// Reads the current value, or `None` when there is no data this tick
	fn sample(&mut self) -> Option<f64>;
}

/// The probes a session samples on every tick
#[derive(Debug)]
pub struct ProbeSet {
	pub cpu: Box<dyn Probe>,
	pub memory: Box<dyn Probe>,
	pub power: Box<dyn Probe>,
}

impl ProbeSet {
	/// Selects the best available probe of each kind for this platform
	pub fn detect(policy: PrivilegePolicy, probe_timeout: Duration) -> Self {
		let cpu = cpu::select_cpu_probe();
		let memory = memory::select_memory_probe();
		let power: Box<dyn Probe> = Box::new(PowerProbe::detect(policy, probe_timeout));

		log::info!(
			"Probes selected: cpu={}, memory={}, power={}",
			cpu.name(),
			memory.name(),
			power.name()
		);

		Self { cpu, memory, power }
	}

	/// Establishes baselines for every probe
	pub fn prime_all(&mut self) {
		self.cpu.prime();
		self.memory.prime();
		self.power.prime();
	}
}

/// Operating system name and version, e.g. "Linux 6.1.0"
pub fn platform_description() -> String {
	let name = sysinfo::System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
	match sysinfo::System::kernel_version() {
		Some(version) => format!("{name} {version}"),
		None => name,
	}
}
