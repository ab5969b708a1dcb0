use std::process;

use clap::Parser;
use resource_recorder::config::{Args, Config};
use resource_recorder::error::{RecorderError, Result};
use resource_recorder::signal::{self, CancellationToken};

fn run(args: Args) -> Result<()> {
	let config = Config::from_args(args)?;

	let token = CancellationToken::new();
	signal::install_interrupt_handler(&token).map_err(RecorderError::Signal)?;

	let recording = resource_recorder::record(&config, &token)?;

	if signal::interrupt_count() > 1 {
		log::debug!("Received {} interrupts while stopping", signal::interrupt_count());
	}
	log::info!("Recorded {} ticks", recording.snapshot.ticks);

	Ok(())
}

fn main() {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = run(Args::parse()) {
		eprintln!("Error: {}", e);
		process::exit(1);
	}
}
