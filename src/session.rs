use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::clock::SamplingClock;
use crate::constants::SECONDS_PER_HOUR;
use crate::energy::EnergyIntegrator;
use crate::error::{RecorderError, Result};
use crate::probe::{ProbeSet, platform_description};
use crate::signal::CancellationToken;
use crate::stats::{Aggregator, MetricId, RunningStats};

/// Lifecycle of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Idle,
	Running,
	Stopping,
	Reported,
}

/// One tick's readings; `None` marks a metric with no data this tick
#[derive(Debug, Clone, Copy)]
pub struct Sample {
	pub cpu_pct: Option<f64>,
	pub mem_mb: Option<f64>,
	pub power_w: Option<f64>,
	pub timestamp: Instant,
}

/// Final state of a session, handed to the reporter once
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
	pub started_at: DateTime<Utc>,
	pub ended_at: DateTime<Utc>,
	pub duration: Duration,
	pub cpu: RunningStats,
	pub memory: RunningStats,
	pub power: RunningStats,
	/// `None` when no tick had a power reading
	pub energy_joules: Option<f64>,
	/// Completed ticks
	pub ticks: u64,
	pub power_source: String,
	pub platform: String,
}

impl SessionSnapshot {
	pub fn stats(&self, metric: MetricId) -> &RunningStats {
		match metric {
			MetricId::Cpu => &self.cpu,
			MetricId::Memory => &self.memory,
			MetricId::Power => &self.power,
		}
	}

	pub fn energy_watt_hours(&self) -> Option<f64> {
		self.energy_joules.map(|joules| joules / SECONDS_PER_HOUR)
	}
}

/// Owns the probes and the running totals of one recording
pub struct Session {
	state: SessionState,
	probes: ProbeSet,
	aggregator: Aggregator,
	energy: EnergyIntegrator,
	clock: SamplingClock,
	started_at: Option<DateTime<Utc>>,
	started: Option<Instant>,
	last_tick: Option<Instant>,
	ticks: u64,
}

impl Session {
	pub fn new(probes: ProbeSet, interval: Duration) -> Self {
		Self {
			state: SessionState::Idle,
			probes,
			aggregator: Aggregator::new(),
			energy: EnergyIntegrator::new(),
			clock: SamplingClock::new(interval),
			started_at: None,
			started: None,
			last_tick: None,
			ticks: 0,
		}
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	pub fn ticks(&self) -> u64 {
		self.ticks
	}

	pub fn aggregator(&self) -> &Aggregator {
		&self.aggregator
	}

	pub fn energy(&self) -> &EnergyIntegrator {
		&self.energy
	}

	pub fn power_source(&self) -> &str {
		self.probes.power.name()
	}

	fn expect_state(&self, expected: SessionState) -> Result<()> {
		if self.state == expected {
			Ok(())
		} else {
			Err(RecorderError::InvalidState {
				expected,
				actual: self.state,
			})
		}
	}

	/// Records the start time and takes every probe's baseline
	pub fn start(&mut self) -> Result<()> {
		self.expect_state(SessionState::Idle)?;

		self.started_at = Some(Utc::now());
		self.probes.prime_all();

		let now = Instant::now();
		self.started = Some(now);
		self.last_tick = Some(now);
		self.clock.reset(now);
		self.state = SessionState::Running;

		log::info!("Recording started, sampling every {:?}", self.clock.interval());
		Ok(())
	}

	/// Samples every probe, then folds the readings into the totals
	///
	/// All probes are read before anything is committed, so a tick is
	/// either fully counted or not at all.
	pub fn tick(&mut self) -> Result<Sample> {
		self.expect_state(SessionState::Running)?;

		let cpu_pct = self.probes.cpu.sample();
		let mem_mb = self.probes.memory.sample();
		let power_w = self.probes.power.sample();
		let timestamp = Instant::now();

		let elapsed = self
			.last_tick
			.map_or(Duration::ZERO, |last| timestamp.saturating_duration_since(last));

		let sample = Sample {
			cpu_pct,
			mem_mb,
			power_w,
			timestamp,
		};
		self.commit(&sample, elapsed);
		Ok(sample)
	}

	fn commit(&mut self, sample: &Sample, elapsed: Duration) {
		if let Some(cpu) = sample.cpu_pct {
			self.aggregator.observe(MetricId::Cpu, cpu);
		}
		if let Some(mem) = sample.mem_mb {
			self.aggregator.observe(MetricId::Memory, mem);
		}
		if let Some(power) = sample.power_w {
			if self.aggregator.observe(MetricId::Power, power) {
				self.energy.integrate(power, elapsed.as_secs_f64());
			}
		}

		self.last_tick = Some(sample.timestamp);
		self.ticks += 1;

		log::debug!(
			"tick {}: cpu={:?} mem={:?} power={:?}",
			self.ticks,
			sample.cpu_pct,
			sample.mem_mb,
			sample.power_w
		);
	}

	/// Ticks on the sampling clock until `token` is cancelled, then moves to
	/// `Stopping`
	///
	/// Cancellation is only looked at between ticks.
	pub fn run_until_cancelled(&mut self, token: &CancellationToken) -> Result<u64> {
		self.expect_state(SessionState::Running)?;

		while !token.is_cancelled() {
			if !self.clock.wait(token) {
				break;
			}
			self.tick()?;
		}

		self.stop()?;
		Ok(self.ticks)
	}

	/// Stops sampling; calling it again while stopping is harmless
	pub fn stop(&mut self) -> Result<()> {
		match self.state {
			SessionState::Running => {
				log::info!("Stop requested after {} ticks", self.ticks);
				self.state = SessionState::Stopping;
				Ok(())
			},
			SessionState::Stopping => Ok(()),
			actual => Err(RecorderError::InvalidState {
				expected: SessionState::Running,
				actual,
			}),
		}
	}

	/// Assembles the final snapshot; only succeeds once
	pub fn finish(&mut self) -> Result<SessionSnapshot> {
		if self.state == SessionState::Running {
			self.stop()?;
		}
		self.expect_state(SessionState::Stopping)?;

		let ended_at = Utc::now();
		let started_at = self.started_at.unwrap_or(ended_at);
		let duration = self.started.map_or(Duration::ZERO, |started| started.elapsed());

		let snapshot = SessionSnapshot {
			started_at,
			ended_at,
			duration,
			cpu: self.aggregator.snapshot(MetricId::Cpu),
			memory: self.aggregator.snapshot(MetricId::Memory),
			power: self.aggregator.snapshot(MetricId::Power),
			energy_joules: self.energy.total_if_measured(),
			ticks: self.ticks,
			power_source: self.power_source().to_string(),
			platform: platform_description(),
		};

		self.state = SessionState::Reported;
		Ok(snapshot)
	}

	/// Runs the whole lifecycle and hands the snapshot to `reporter`
	pub fn run<R>(mut self, token: &CancellationToken, reporter: impl FnOnce(&SessionSnapshot) -> R) -> Result<R> {
		self.start()?;
		self.run_until_cancelled(token)?;
		let snapshot = self.finish()?;
		Ok(reporter(&snapshot))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::probe::Probe;
	use std::collections::VecDeque;

	#[derive(Debug)]
	struct Scripted {
		values: VecDeque<Option<f64>>,
	}

	impl Scripted {
		fn boxed(values: &[Option<f64>]) -> Box<dyn Probe> {
			Box::new(Self {
				values: values.iter().copied().collect(),
			})
		}
	}

	impl Probe for Scripted {
		fn name(&self) -> &str {
			"scripted"
		}

		fn sample(&mut self) -> Option<f64> {
			self.values.pop_front().flatten()
		}
	}

	fn probes(cpu: &[Option<f64>], mem: &[Option<f64>], power: &[Option<f64>]) -> ProbeSet {
		ProbeSet {
			cpu: Scripted::boxed(cpu),
			memory: Scripted::boxed(mem),
			power: Scripted::boxed(power),
		}
	}

	#[test]
	fn follows_lifecycle() {
		let mut session = Session::new(probes(&[], &[], &[]), Duration::from_millis(10));
		assert_eq!(session.state(), SessionState::Idle);

		session.start().unwrap();
		assert_eq!(session.state(), SessionState::Running);

		session.stop().unwrap();
		session.stop().unwrap();
		assert_eq!(session.state(), SessionState::Stopping);

		session.finish().unwrap();
		assert_eq!(session.state(), SessionState::Reported);
	}

	#[test]
	fn operations_out_of_order_fail() {
		let mut session = Session::new(probes(&[], &[], &[]), Duration::from_millis(10));
		assert!(matches!(session.tick(), Err(RecorderError::InvalidState { .. })));
		assert!(session.finish().is_err());

		session.start().unwrap();
		assert!(session.start().is_err());
		session.finish().unwrap();

		assert!(matches!(
			session.finish(),
			Err(RecorderError::InvalidState {
				actual: SessionState::Reported,
				..
			})
		));
	}

	#[test]
	fn missing_readings_are_skipped_per_metric() {
		let mut session = Session::new(
			probes(
				&[None, Some(10.0), Some(30.0)],
				&[Some(100.0), Some(200.0), None],
				&[None, None, None],
			),
			Duration::from_millis(10),
		);
		session.start().unwrap();
		for _ in 0..3 {
			session.tick().unwrap();
		}

		let snapshot = session.finish().unwrap();
		assert_eq!(snapshot.ticks, 3);
		assert_eq!(snapshot.cpu.count, 2);
		assert_eq!(snapshot.cpu.average(), Some(20.0));
		assert_eq!(snapshot.memory.count, 2);
		assert_eq!(snapshot.memory.max, 200.0);
		assert!(snapshot.power.is_empty());
		assert_eq!(snapshot.energy_joules, None);
		assert_eq!(snapshot.energy_watt_hours(), None);
	}

	#[test]
	fn power_feeds_energy_integrator() {
		let mut session = Session::new(
			probes(&[], &[], &[Some(10.0), None, Some(10.0)]),
			Duration::from_millis(10),
		);
		session.start().unwrap();
		for _ in 0..3 {
			std::thread::sleep(Duration::from_millis(20));
			session.tick().unwrap();
		}

		let snapshot = session.finish().unwrap();
		assert_eq!(snapshot.power.count, 2);
		// two ticks of ~20 ms at 10 W, the absent tick adds nothing
		let joules = snapshot.energy_joules.unwrap();
		assert!(joules >= 0.39 && joules < 5.0, "joules = {joules}");
	}

	#[test]
	fn run_reports_exactly_once() {
		let token = CancellationToken::new();
		token.cancel();

		let session = Session::new(probes(&[], &[], &[]), Duration::from_millis(10));
		let mut calls = 0;
		let ticks = session
			.run(&token, |snapshot| {
				calls += 1;
				snapshot.ticks
			})
			.unwrap();

		assert_eq!(calls, 1);
		assert_eq!(ticks, 0);
	}
}
