use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::probe::power::PowerReader;

const POWER_LINE_KEYS: [&str; 5] = [
	"package power",
	"combined power",
	"cpu power",
	"processor power",
	"pkg power",
];

/// Sampler sets to try, richest first; some Macs reject `smc`
const SAMPLER_SETS: [&str; 2] = ["cpu_power,smc", "cpu_power"];

/// Instantaneous package power from macOS `powermetrics`
///
/// Needs passwordless sudo for `powermetrics`. Each reading runs the tool
/// once under a hard timeout.
#[derive(Debug)]
pub struct PowermetricsReader {
	timeout: Duration,
	samplers: &'static str,
}

impl PowermetricsReader {
	/// Checks that `powermetrics` runs and reports a power line
	pub fn open(timeout: Duration) -> io::Result<Self> {
		let samplers = negotiate_samplers(|samplers| run_with_timeout(&mut Self::command(samplers), timeout))?;
		log::debug!("powermetrics samplers: {}", samplers);
		Ok(Self { timeout, samplers })
	}

	fn command(samplers: &str) -> Command {
		let mut cmd = Command::new("sudo");
		cmd.args([
			"-n",
			"powermetrics",
			"-n",
			"1",
			"-i",
			"200",
			"--samplers",
			samplers,
		]);
		cmd
	}

	fn run(&self) -> io::Result<String> {
		run_with_timeout(&mut Self::command(self.samplers), self.timeout)
	}
}

/// Returns the first sampler set whose output carries a power line
///
/// When every set fails, the last error is returned.
pub fn negotiate_samplers<F>(mut run: F) -> io::Result<&'static str>
where
	F: FnMut(&'static str) -> io::Result<String>,
{
	let mut last_error = io::Error::new(io::ErrorKind::NotFound, "no powermetrics sampler set to try");

	for samplers in SAMPLER_SETS {
		match run(samplers) {
			Ok(output) if parse_power_output(&output).is_some() => return Ok(samplers),
			Ok(_) => {
				last_error = io::Error::new(
					io::ErrorKind::InvalidData,
					format!("powermetrics --samplers {samplers} output has no power line"),
				);
			},
			Err(e) => {
				log::debug!("powermetrics --samplers {} failed: {}", samplers, e);
				last_error = e;
			},
		}
	}

	Err(last_error)
}

impl PowerReader for PowermetricsReader {
	fn read_watts(&mut self) -> Option<f64> {
		match self.run() {
			Ok(output) => parse_power_output(&output),
			Err(e) => {
				log::debug!("powermetrics reading skipped: {}", e);
				None
			},
		}
	}
}

/// Runs `cmd` and returns its stdout, killing it once `timeout` elapses
///
/// A non-zero exit is reported as `PermissionDenied`, which is what
/// `sudo -n` does when a password would be needed.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> io::Result<String> {
	let mut child = cmd
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::null())
		.spawn()?;

	let mut stdout = child
		.stdout
		.take()
		.ok_or_else(|| io::Error::other("child stdout not captured"))?;

	// Drain stdout on a helper thread so a chatty child can't block on a full pipe
	let (tx, rx) = mpsc::channel();
	thread::spawn(move || {
		let mut output = String::new();
		let result = stdout.read_to_string(&mut output).map(|_| output);
		let _ = tx.send(result);
	});

	let deadline = Instant::now() + timeout;
	let status = loop {
		if let Some(status) = child.try_wait()? {
			break status;
		}
		if Instant::now() >= deadline {
			let _ = child.kill();
			let _ = child.wait();
			return Err(io::Error::new(
				io::ErrorKind::TimedOut,
				format!("no result within {} ms", timeout.as_millis()),
			));
		}
		thread::sleep(Duration::from_millis(10));
	};

	if !status.success() {
		return Err(io::Error::new(
			io::ErrorKind::PermissionDenied,
			format!("command exited with {}", status),
		));
	}

	let remaining = deadline.saturating_duration_since(Instant::now()).max(Duration::from_millis(50));
	rx.recv_timeout(remaining)
		.map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "output not drained in time"))?
}

/// Extracts the package power in watts from `powermetrics` text output
///
/// Accepts lines such as `CPU Power: 1234 mW` or `Package Power: 3.12W`.
pub fn parse_power_output(output: &str) -> Option<f64> {
	output.lines().find_map(|line| {
		let lower = line.trim().to_lowercase();
		if !POWER_LINE_KEYS.iter().any(|key| lower.starts_with(key)) {
			return None;
		}
		let (_, value) = lower.split_once(':')?;
		parse_power_value(value)
	})
}

fn parse_power_value(value: &str) -> Option<f64> {
	let mut tokens = value.split_whitespace();
	let first = tokens.next()?;

	let (number, unit) = match first.find(|c: char| c.is_ascii_alphabetic()) {
		Some(split) => first.split_at(split),
		None => (first, tokens.next().unwrap_or("w")),
	};

	let number: f64 = number.parse().ok()?;
	match unit {
		"mw" => Some(number / 1000.0),
		"w" => Some(number),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_milliwatt_lines() {
		let output = "*** Sampled system activity ***\n\
			E-Cluster HW active frequency: 1020 MHz\n\
			CPU Power: 1234 mW\n\
			GPU Power: 50 mW\n";
		assert_eq!(parse_power_output(output), Some(1.234));
	}

	#[test]
	fn parses_watt_lines() {
		assert_eq!(parse_power_output("Package Power: 3.12W\n"), Some(3.12));
		assert_eq!(parse_power_output("  package power: 7.5 W\n"), Some(7.5));
	}

	#[test]
	fn ignores_unrelated_output() {
		assert_eq!(parse_power_output("CPU die temperature: 48.2 C\n"), None);
		assert_eq!(parse_power_output("CPU Power: unknown\n"), None);
		assert_eq!(parse_power_output(""), None);
	}

	#[test]
	fn rejected_smc_sampler_falls_back_to_cpu_power() {
		let mut tried = Vec::new();
		let samplers = negotiate_samplers(|samplers| {
			tried.push(samplers);
			if samplers.contains("smc") {
				Err(io::Error::new(io::ErrorKind::PermissionDenied, "exit status: 1"))
			} else {
				Ok("CPU Power: 2100 mW\n".to_string())
			}
		})
		.unwrap();

		assert_eq!(samplers, "cpu_power");
		assert_eq!(tried, vec!["cpu_power,smc", "cpu_power"]);
	}

	#[test]
	fn combined_samplers_are_kept_when_they_work() {
		let samplers = negotiate_samplers(|_| Ok("Package Power: 4.2W\n".to_string())).unwrap();
		assert_eq!(samplers, "cpu_power,smc");
	}

	#[test]
	fn every_sampler_set_failing_reports_last_error() {
		let err = negotiate_samplers(|samplers| {
			if samplers == "cpu_power" {
				Err(io::Error::new(io::ErrorKind::PermissionDenied, "sudo: a password is required"))
			} else {
				Ok("nothing useful\n".to_string())
			}
		})
		.unwrap_err();

		assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
	}

	#[cfg(unix)]
	#[test]
	fn returns_stdout_of_fast_command() {
		let mut cmd = Command::new("sh");
		cmd.args(["-c", "echo 'CPU Power: 900 mW'"]);
		let output = run_with_timeout(&mut cmd, Duration::from_secs(5)).unwrap();
		assert_eq!(parse_power_output(&output), Some(0.9));
	}

	#[cfg(unix)]
	#[test]
	fn kills_slow_command() {
		let mut cmd = Command::new("sh");
		cmd.args(["-c", "sleep 5"]);
		let start = Instant::now();
		let err = run_with_timeout(&mut cmd, Duration::from_millis(100)).unwrap_err();

		assert_eq!(err.kind(), io::ErrorKind::TimedOut);
		assert!(start.elapsed() < Duration::from_secs(3));
	}

	#[cfg(unix)]
	#[test]
	fn failing_command_is_permission_denied() {
		let mut cmd = Command::new("sh");
		cmd.args(["-c", "exit 1"]);
		let err = run_with_timeout(&mut cmd, Duration::from_secs(5)).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
	}
}
