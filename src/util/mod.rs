use std::time::Duration;

/// Difference between two readings of a cumulative counter
///
/// A counter that reads lower than before is assumed to have wrapped once
/// at `range`.
pub const fn counter_delta(start: u64, end: u64, range: u64) -> u64 {
	if end < start {
		// Handle counter wrap-around
		end.wrapping_add(range).wrapping_sub(start)
	} else {
		end - start
	}
}

/// Average power over an interval, `None` if the interval is empty
pub fn average_watts(joules: f64, elapsed: Duration) -> Option<f64> {
	let secs = elapsed.as_secs_f64();
	if secs <= 0.0 || !joules.is_finite() {
		return None;
	}
	Some(joules / secs)
}

/// Formats a number of seconds as `1d 2h 3m 4s`, omitting leading zero parts
pub fn human_duration(seconds: u64) -> String {
	let (days, rest) = (seconds / 86_400, seconds % 86_400);
	let (hours, rest) = (rest / 3_600, rest % 3_600);
	let (minutes, secs) = (rest / 60, rest % 60);

	let mut parts = Vec::new();
	if days > 0 {
		parts.push(format!("{days}d"));
	}
	if hours > 0 {
		parts.push(format!("{hours}h"));
	}
	if minutes > 0 {
		parts.push(format!("{minutes}m"));
	}
	parts.push(format!("{secs}s"));
	parts.join(" ")
}
