use std::io;
use std::path::PathBuf;

use crate::session::SessionState;

/// Errors that stop a recording run
///
/// Probe failures never show up here: they are absorbed at the probe
/// boundary and turn into a missing observation for that tick.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
	/// Invalid command line or configuration value
	#[error("invalid configuration: {0}")]
	Config(String),

	/// The summary directory could not be created or written
	#[error("output directory {}: {source}", path.display())]
	OutputDir {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	/// The interrupt handler could not be installed
	#[error("failed to install interrupt handler: {0}")]
	Signal(#[source] io::Error),

	/// A session operation was called from the wrong lifecycle state
	#[error("session is {actual:?}, expected {expected:?}")]
	InvalidState {
		expected: SessionState,
		actual: SessionState,
	},

	#[error(transparent)]
	Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
