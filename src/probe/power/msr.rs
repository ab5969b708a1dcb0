use msru::{Accessor, Msr};
use std::fs;
use std::io;

use crate::constants::{MSR_DEVICE_PATH, MSR_ENERGY_COUNTER_RANGE};
use crate::cpu_type::{RaplRegisters, detect_cpu_type};
use crate::probe::power::rapl::EnergyCounter;

/// Reads a value from a Model-Specific Register (MSR)
///
/// # Arguments
///
/// * `msr_address` - The address of the MSR to read
/// * `cpu_id` - The CPU ID to read the MSR from
pub fn read_msr(msr_address: u32, cpu_id: u16) -> io::Result<u64> {
	Msr::new(msr_address, cpu_id)
		.map_err(io::Error::other)?
		.read()
		.map_err(io::Error::other)
}

/// Joules per count encoded in bits 12:8 of a RAPL power unit register
pub fn energy_unit_joules(unit_msr: u64) -> f64 {
	let esu = (unit_msr >> 8) & 0x1F;
	1.0 / (1u64 << esu) as f64
}

/// Package energy from the RAPL energy status MSR of CPU 0
#[derive(Debug)]
pub struct MsrEnergyCounter {
	cpu_id: u16,
	registers: RaplRegisters,
	joules_per_count: f64,
}

impl MsrEnergyCounter {
	pub fn open() -> io::Result<Self> {
		let cpu_type = detect_cpu_type();
		let registers = cpu_type.rapl_registers().ok_or_else(|| {
			io::Error::new(
				io::ErrorKind::Unsupported,
				format!("{:?} CPU has no RAPL registers", cpu_type),
			)
		})?;

		// Opening the device directly keeps the PermissionDenied/NotFound kind
		fs::File::open(MSR_DEVICE_PATH)?;

		let counter = Self {
			cpu_id: 0,
			registers,
			joules_per_count: energy_unit_joules(read_msr(registers.unit, 0)?),
		};
		counter.read_raw()?;
		Ok(counter)
	}
}

impl EnergyCounter for MsrEnergyCounter {
	fn read_raw(&self) -> io::Result<Vec<u64>> {
		let value = read_msr(self.registers.package_energy, self.cpu_id)?;
		Ok(vec![value & (MSR_ENERGY_COUNTER_RANGE - 1)])
	}

	fn joules(&self, _domain: usize, delta: u64) -> f64 {
		delta as f64 * self.joules_per_count
	}

	fn range(&self, _domain: usize) -> Option<u64> {
		Some(MSR_ENERGY_COUNTER_RANGE)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::util::counter_delta;

	#[test]
	fn decodes_energy_status_unit() {
		// Common Intel value: ESU = 14 -> 61 µJ per count
		let joules = energy_unit_joules(0x000A_0E03);
		assert!((joules - 1.0 / 16384.0).abs() < f64::EPSILON);
	}

	#[test]
	fn wrap_across_32_bits() {
		let delta = counter_delta(0xFFFF_FF00, 0x0000_0100, MSR_ENERGY_COUNTER_RANGE);
		assert_eq!(delta, 0x200);
	}
}
