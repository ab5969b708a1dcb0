use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::constants::{DEFAULT_INTERVAL_SECS, MAX_INTERVAL_SECS, PROBE_TIMEOUT_FRACTION};
use crate::error::{RecorderError, Result};
use crate::probe::power::PrivilegePolicy;

/// Command line arguments
#[derive(Debug, Clone, Parser)]
#[command(
	name = "resource-recorder",
	version,
	about = "Records CPU, memory and power usage until interrupted, then prints a summary"
)]
pub struct Args {
	/// Sampling interval in seconds
	#[arg(short, long, value_name = "SECONDS", default_value_t = DEFAULT_INTERVAL_SECS, allow_negative_numbers = true)]
	pub interval: f64,

	/// Directory for the summary file [default: ~/Desktop/resource-recorder/runs]
	#[arg(short, long, value_name = "DIR")]
	pub output_dir: Option<PathBuf>,

	/// How to report power sources that need elevated privileges
	#[arg(long, value_enum, default_value_t = PrivilegePolicy::Silent)]
	pub privilege_policy: PrivilegePolicy,

	/// Print the summary without writing it to disk
	#[arg(long)]
	pub no_save: bool,
}

/// Validated settings for one run
#[derive(Debug, Clone)]
pub struct Config {
	pub interval: Duration,
	/// `None` when the summary is not saved
	pub output_dir: Option<PathBuf>,
	pub privilege_policy: PrivilegePolicy,
	/// Upper bound on a single slow probe reading
	pub probe_timeout: Duration,
}

impl Config {
	pub fn from_args(args: Args) -> Result<Self> {
		let secs = args.interval;
		if !secs.is_finite() || secs <= 0.0 || secs > MAX_INTERVAL_SECS {
			return Err(RecorderError::Config(format!(
				"interval must be greater than 0 and at most {MAX_INTERVAL_SECS} seconds, got {secs}"
			)));
		}
		let interval = Duration::from_secs_f64(secs);

		let output_dir = if args.no_save {
			None
		} else {
			match args.output_dir {
				Some(dir) => Some(dir),
				None => Some(default_output_dir().ok_or_else(|| {
					RecorderError::Config("no home directory found, pass --output-dir or --no-save".to_string())
				})?),
			}
		};

		Ok(Self {
			interval,
			output_dir,
			privilege_policy: args.privilege_policy,
			probe_timeout: interval.mul_f64(PROBE_TIMEOUT_FRACTION),
		})
	}

	/// Creates the output directory and checks it can be written to, so a bad
	/// path fails before recording
	pub fn prepare_output_dir(&self) -> Result<Option<&Path>> {
		let Some(dir) = self.output_dir.as_deref() else {
			return Ok(None);
		};

		fs::create_dir_all(dir).map_err(|source| RecorderError::OutputDir {
			path: dir.to_path_buf(),
			source,
		})?;

		// Permission bits say nothing about read-only mounts, so write for real
		tempfile::Builder::new()
			.prefix(".resource-recorder-")
			.tempfile_in(dir)
			.map_err(|source| RecorderError::OutputDir {
				path: dir.to_path_buf(),
				source,
			})?;

		Ok(Some(dir))
	}
}

/// `~/Desktop/resource-recorder/runs`
pub fn default_output_dir() -> Option<PathBuf> {
	env::var_os("HOME")
		.or_else(|| env::var_os("USERPROFILE"))
		.filter(|home| !home.is_empty())
		.map(|home| PathBuf::from(home).join("Desktop").join("resource-recorder").join("runs"))
}
