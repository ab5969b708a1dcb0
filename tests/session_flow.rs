use std::fs;
use std::time::Duration;

use resource_recorder::probe::cpu::ProcStatCpuProbe;
use resource_recorder::probe::power::PowerProbe;
use resource_recorder::probe::{Probe, ProbeSet};
use resource_recorder::report::render_summary;
use resource_recorder::session::{Session, SessionState};
use resource_recorder::signal::CancellationToken;

/// Returns the same value on every tick
#[derive(Debug)]
struct Constant {
	value: f64,
}

impl Probe for Constant {
	fn name(&self) -> &str {
		"constant"
	}

	fn sample(&mut self) -> Option<f64> {
		Some(self.value)
	}
}

/// Cancels the token from inside a tick, after `after` reads
#[derive(Debug)]
struct CancelDuringSample {
	token: CancellationToken,
	after: u32,
	calls: u32,
}

impl Probe for CancelDuringSample {
	fn name(&self) -> &str {
		"cancelling"
	}

	fn sample(&mut self) -> Option<f64> {
		self.calls += 1;
		if self.calls == self.after {
			self.token.cancel();
		}
		Some(f64::from(self.calls))
	}
}

/// Stop requested while a tick is in progress still leaves whole ticks only
#[test]
fn cancellation_mid_tick_counts_whole_ticks() {
	let token = CancellationToken::new();
	let probes = ProbeSet {
		cpu: Box::new(CancelDuringSample {
			token: token.clone(),
			after: 3,
			calls: 0,
		}),
		memory: Box::new(Constant { value: 512.0 }),
		power: Box::new(Constant { value: 2.0 }),
	};

	let snapshot = Session::new(probes, Duration::from_millis(5))
		.run(&token, |snapshot| snapshot.clone())
		.unwrap();

	assert_eq!(snapshot.ticks, 3);
	assert_eq!(snapshot.cpu.count, 3);
	assert_eq!(snapshot.memory.count, 3);
	assert_eq!(snapshot.power.count, 3);
	assert_eq!(snapshot.cpu.min, 1.0);
	assert_eq!(snapshot.cpu.max, 3.0);
	assert_eq!(snapshot.cpu.average(), Some(2.0));
	assert!(snapshot.energy_joules.unwrap() > 0.0);
}

/// A machine without any power source still gets a complete report
#[test]
fn report_marks_missing_power_as_not_available() {
	let token = CancellationToken::new();
	let probes = ProbeSet {
		cpu: Box::new(CancelDuringSample {
			token: token.clone(),
			after: 2,
			calls: 0,
		}),
		memory: Box::new(Constant { value: 0.0 }),
		power: Box::new(PowerProbe::absent()),
	};

	let mut session = Session::new(probes, Duration::from_millis(5));
	session.start().unwrap();
	session.run_until_cancelled(&token).unwrap();
	assert_eq!(session.state(), SessionState::Stopping);

	let snapshot = session.finish().unwrap();
	assert_eq!(session.state(), SessionState::Reported);
	assert_eq!(snapshot.power_source, "none");
	assert_eq!(snapshot.energy_joules, None);

	let text = render_summary(&snapshot);
	assert!(text.contains("RAM used MB : min 0.0 · max 0.0 · avg 0.0"));
	assert!(text.contains("Watts       : min N/A · max N/A · avg N/A"));
	assert!(text.contains("Energy      : N/A"));
}

/// The CPU probe needs one interval of history before it reports
#[test]
fn cpu_probe_reports_from_second_reading() {
	let dir = tempfile::tempdir().unwrap();
	let stat = dir.path().join("stat");
	fs::write(&stat, "cpu  200 0 100 700 0 0 0 0 0 0\ncpu0 200 0 100 700 0 0 0 0 0 0\n").unwrap();

	let mut probe = ProcStatCpuProbe::new(&stat);
	assert_eq!(probe.sample(), None);

	fs::write(&stat, "cpu  260 0 120 820 0 0 0 0 0 0\ncpu0 260 0 120 820 0 0 0 0 0 0\n").unwrap();
	let pct = probe.sample().unwrap();
	assert!(pct.is_finite() && pct >= 0.0);
	assert!((pct - 40.0).abs() < 1e-9);
}
