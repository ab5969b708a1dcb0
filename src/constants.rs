// AMD RAPL MSR addresses
pub const AMD_ENERGY_UNIT_MSR: u32 = 0xC001_0299;
pub const AMD_ENERGY_PKG_MSR: u32 = 0xC001_029B;

// Intel RAPL MSR addresses
pub const INTEL_POWER_UNIT_MSR: u32 = 0x606;
pub const INTEL_PKG_ENERGY_MSR: u32 = 0x611;

// RAPL energy status registers are 32 bits wide
pub const MSR_ENERGY_COUNTER_RANGE: u64 = 1 << 32;

// Platform counter locations
pub const PROC_STAT_PATH: &str = "/proc/stat";
pub const PROC_MEMINFO_PATH: &str = "/proc/meminfo";
pub const PROC_CPUINFO_PATH: &str = "/proc/cpuinfo";
pub const POWERCAP_PATH: &str = "/sys/class/powercap";
pub const POWER_SUPPLY_PATH: &str = "/sys/class/power_supply";
pub const MSR_DEVICE_PATH: &str = "/dev/cpu/0/msr";

// Sampling settings
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;
pub const MAX_INTERVAL_SECS: f64 = 3600.0;
pub const PROBE_TIMEOUT_FRACTION: f64 = 0.8;
pub const CLOCK_SLICE_MS: u64 = 50;

// Unit conversions
pub const MICRO: f64 = 1_000_000.0;
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
pub const KB_PER_MB: f64 = 1024.0;
pub const SECONDS_PER_HOUR: f64 = 3600.0;

// Reporting
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
pub const NOT_AVAILABLE: &str = "N/A";
