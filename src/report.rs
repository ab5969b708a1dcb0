use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::constants::{NOT_AVAILABLE, SECONDS_PER_HOUR, TIMESTAMP_FORMAT};
use crate::error::{RecorderError, Result};
use crate::session::SessionSnapshot;
use crate::stats::{MetricId, RunningStats};
use crate::util::human_duration;

/// Formats min/max/avg, with every field `N/A` when nothing was observed
pub fn format_stats(stats: &RunningStats) -> String {
	match stats.summary() {
		Some(summary) => summary.to_string(),
		None => format!("min {NOT_AVAILABLE} · max {NOT_AVAILABLE} · avg {NOT_AVAILABLE}"),
	}
}

pub fn format_energy(joules: Option<f64>) -> String {
	match joules {
		Some(joules) => format!("{:.4} Wh ({:.1} J)", joules / SECONDS_PER_HOUR, joules),
		None => NOT_AVAILABLE.to_string(),
	}
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
	at.format(TIMESTAMP_FORMAT).to_string()
}

/// Renders the end-of-run summary
///
/// Every metric gets a line even when it was never available.
pub fn render_summary(snapshot: &SessionSnapshot) -> String {
	let secs = snapshot.duration.as_secs();
	let mut out = String::new();

	let _ = writeln!(out, "Run started : {}", format_timestamp(&snapshot.started_at));
	let _ = writeln!(out, "Run ended   : {}", format_timestamp(&snapshot.ended_at));
	let _ = writeln!(out, "Duration    : {} s ({})", secs, human_duration(secs));
	let _ = writeln!(out, "OS          : {}", snapshot.platform);
	let _ = writeln!(out, "Samples     : {}", snapshot.ticks);
	out.push('\n');

	for metric in MetricId::ALL {
		let _ = writeln!(
			out,
			"{:<12}: {}",
			metric.as_str(),
			format_stats(snapshot.stats(metric))
		);
	}
	let _ = writeln!(out, "{:<12}: {}", "Energy", format_energy(snapshot.energy_joules));
	let _ = writeln!(out, "{:<12}: {}", "Power source", snapshot.power_source);

	out
}

/// Startup banner shown before recording begins
pub fn render_banner(interval: Duration, power_source: &str) -> String {
	let uptime = sysinfo::System::uptime();
	let mut out = String::new();

	let _ = writeln!(out, "--------- Starting resource recording ---------");
	let _ = writeln!(out, "Uptime      : {}", human_duration(uptime));
	let _ = writeln!(
		out,
		"CPUs        : {} logical, {} physical",
		num_cpus::get(),
		num_cpus::get_physical()
	);
	let _ = writeln!(out, "Interval    : {:.3} s", interval.as_secs_f64());
	let _ = writeln!(out, "Power source: {}", power_source);
	let _ = writeln!(out, "Press Ctrl+C to stop and save the summary.");
	let _ = write!(out, "-----------------------------------------------");

	out
}

/// File name for a run's summary, keyed by its start time
pub fn summary_path(dir: &Path, started_at: &DateTime<Utc>) -> PathBuf {
	dir.join(format!("summary_{}.txt", format_timestamp(started_at)))
}

/// Writes the rendered summary into `dir` and returns the file path
pub fn write_summary(dir: &Path, snapshot: &SessionSnapshot) -> Result<PathBuf> {
	let path = summary_path(dir, &snapshot.started_at);
	fs::write(&path, render_summary(snapshot)).map_err(|source| RecorderError::OutputDir {
		path: path.clone(),
		source,
	})?;
	Ok(path)
}
