use std::thread;
use std::time::{Duration, Instant};

use crate::constants::CLOCK_SLICE_MS;
use crate::signal::CancellationToken;

/// Fixed-period tick source for the sampling loop
///
/// Deadlines are absolute, so time spent inside a tick does not push later
/// ticks back. Ticks missed while the loop was busy are skipped, not
/// delivered in a burst.
#[derive(Debug)]
pub struct SamplingClock {
	interval: Duration,
	next_tick: Instant,
}

impl SamplingClock {
	pub fn new(interval: Duration) -> Self {
		Self {
			interval,
			next_tick: Instant::now() + interval,
		}
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Schedules the first tick one interval after `now`
	pub fn reset(&mut self, now: Instant) {
		self.next_tick = now + self.interval;
	}

	/// Blocks until the next tick is due
	///
	/// Returns `false` without ticking if `token` is cancelled while waiting.
	pub fn wait(&mut self, token: &CancellationToken) -> bool {
		let slice = Duration::from_millis(CLOCK_SLICE_MS);

		let now = loop {
			if token.is_cancelled() {
				return false;
			}
			let now = Instant::now();
			if now >= self.next_tick {
				break now;
			}
			thread::sleep((self.next_tick - now).min(slice));
		};

		self.next_tick += self.interval;
		if self.next_tick <= now {
			self.next_tick = now + self.interval;
		}
		true
	}
}
