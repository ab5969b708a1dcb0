pub mod clock;
pub mod config;
pub mod constants;
pub mod cpu_type;
pub mod energy;
pub mod error;
pub mod probe;
pub mod report;
pub mod session;
pub mod signal;
pub mod stats;
pub mod util;

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::probe::ProbeSet;
use crate::report::{render_banner, render_summary, write_summary};
use crate::session::{Session, SessionSnapshot};
use crate::signal::CancellationToken;

/// What a finished recording produced
#[derive(Debug)]
pub struct Recording {
	pub snapshot: SessionSnapshot,
	/// Where the summary was saved, if saving was enabled
	pub saved_to: Option<PathBuf>,
}

/// Records resource usage until `token` is cancelled and reports the run
///
/// This is the main entry point for the recorder. Configuration problems
/// surface before sampling starts; once it has started, the summary is
/// always printed.
pub fn record(config: &Config, token: &CancellationToken) -> Result<Recording> {
	let output_dir = config.prepare_output_dir()?.map(|dir| dir.to_path_buf());

	let probes = ProbeSet::detect(config.privilege_policy, config.probe_timeout);
	let session = Session::new(probes, config.interval);

	println!("{}", render_banner(config.interval, session.power_source()));

	session.run(token, |snapshot| -> Result<Recording> {
		println!();
		println!("{}", render_summary(snapshot).trim_end());

		let saved_to = match output_dir.as_deref() {
			Some(dir) => {
				let path = write_summary(dir, snapshot)?;
				println!("Saved → {}", path.display());
				Some(path)
			},
			None => None,
		};

		Ok(Recording {
			snapshot: snapshot.clone(),
			saved_to,
		})
	})?
}
