use std::fs;

use crate::constants::{
	AMD_ENERGY_PKG_MSR, AMD_ENERGY_UNIT_MSR, INTEL_PKG_ENERGY_MSR, INTEL_POWER_UNIT_MSR, PROC_CPUINFO_PATH,
};

/// Represents CPU manufacturer types that can be detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuType {
	/// Intel CPU architecture
	Intel,
	/// AMD CPU architecture
	Amd,
	/// Any other CPU architecture
	Unsupported,
}

/// Register pair used to read package energy through the RAPL MSRs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaplRegisters {
	/// Register holding the energy status unit in bits 12:8
	pub unit: u32,
	/// Cumulative package energy counter
	pub package_energy: u32,
}

impl CpuType {
	/// RAPL registers for this vendor, if it exposes them
	pub fn rapl_registers(&self) -> Option<RaplRegisters> {
		match self {
			CpuType::Intel => Some(RaplRegisters {
				unit: INTEL_POWER_UNIT_MSR,
				package_energy: INTEL_PKG_ENERGY_MSR,
			}),
			CpuType::Amd => Some(RaplRegisters {
				unit: AMD_ENERGY_UNIT_MSR,
				package_energy: AMD_ENERGY_PKG_MSR,
			}),
			CpuType::Unsupported => None,
		}
	}
}

/// Detects the CPU manufacturer by reading /proc/cpuinfo
pub fn detect_cpu_type() -> CpuType {
	let cpuinfo = fs::read_to_string(PROC_CPUINFO_PATH).unwrap_or_default();
	cpu_type_from_cpuinfo(&cpuinfo)
}

pub fn cpu_type_from_cpuinfo(cpuinfo: &str) -> CpuType {
	if cpuinfo.contains("GenuineIntel") {
		CpuType::Intel
	} else if cpuinfo.contains("AuthenticAMD") || cpuinfo.contains("HygonGenuine") {
		CpuType::Amd
	} else {
		CpuType::Unsupported
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn detects_vendor_from_cpuinfo() {
		assert_eq!(cpu_type_from_cpuinfo("vendor_id\t: GenuineIntel\n"), CpuType::Intel);
		assert_eq!(cpu_type_from_cpuinfo("vendor_id\t: AuthenticAMD\n"), CpuType::Amd);
		assert_eq!(cpu_type_from_cpuinfo("CPU implementer\t: 0x41\n"), CpuType::Unsupported);
	}

	#[test]
	fn only_x86_vendors_have_rapl_registers() {
		assert_eq!(CpuType::Intel.rapl_registers().map(|r| r.package_energy), Some(0x611));
		assert_eq!(CpuType::Amd.rapl_registers().map(|r| r.unit), Some(0xC001_0299));
		assert_eq!(CpuType::Unsupported.rapl_registers(), None);
	}
}
