#![cfg(unix)]

use std::thread;
use std::time::Duration;

use resource_recorder::probe::power::PowerProbe;
use resource_recorder::probe::{Probe, ProbeSet};
use resource_recorder::session::Session;
use resource_recorder::signal::{self, CancellationToken};

#[derive(Debug)]
struct Steady;

impl Probe for Steady {
	fn name(&self) -> &str {
		"steady"
	}

	fn sample(&mut self) -> Option<f64> {
		Some(1.0)
	}
}

/// Two interrupts in a row end the run once and the summary is still produced
#[test]
fn repeated_interrupts_still_report() {
	let token = CancellationToken::new();
	signal::install_interrupt_handler(&token).unwrap();
	assert!(signal::install_interrupt_handler(&token).is_err());

	let raiser = thread::spawn(|| {
		thread::sleep(Duration::from_millis(60));
		// SAFETY: our handler for SIGINT is installed above
		unsafe {
			libc::raise(libc::SIGINT);
			libc::raise(libc::SIGINT);
		}
	});

	let probes = ProbeSet {
		cpu: Box::new(Steady),
		memory: Box::new(Steady),
		power: Box::new(PowerProbe::absent()),
	};
	let mut reports = 0;
	let snapshot = Session::new(probes, Duration::from_millis(10))
		.run(&token, |snapshot| {
			reports += 1;
			snapshot.clone()
		})
		.unwrap();
	raiser.join().unwrap();

	assert!(token.is_cancelled());
	assert_eq!(signal::interrupt_count(), 2);
	assert_eq!(reports, 1);
	assert_eq!(snapshot.cpu.count, snapshot.ticks);
	assert_eq!(snapshot.memory.count, snapshot.ticks);
}
