use std::io;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Cooperative stop request shared between the sampling loop and whoever
/// wants it to end
///
/// Cancelling more than once has no further effect.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
	flag: Arc<AtomicBool>,
}

impl CancellationToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.flag.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.flag.load(Ordering::SeqCst)
	}
}

// Written once before the handler is installed, only read from the handler
static INTERRUPT_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();
static INTERRUPT_COUNT: AtomicUsize = AtomicUsize::new(0);

fn record_interrupt() {
	INTERRUPT_COUNT.fetch_add(1, Ordering::SeqCst);
	if let Some(flag) = INTERRUPT_FLAG.get() {
		flag.store(true, Ordering::SeqCst);
	}
}

/// Routes interrupts to `token`: SIGINT and SIGTERM on unix, Ctrl+C,
/// Ctrl+Break and console close elsewhere
///
/// Can only be installed once per process.
pub fn install_interrupt_handler(token: &CancellationToken) -> io::Result<()> {
	if INTERRUPT_FLAG.set(Arc::clone(&token.flag)).is_err() {
		return Err(io::Error::new(
			io::ErrorKind::AlreadyExists,
			"interrupt handler already installed",
		));
	}

	install_platform_handler()
}

#[cfg(unix)]
extern "C" fn on_interrupt(_signum: libc::c_int) {
	record_interrupt();
}

#[cfg(unix)]
fn install_platform_handler() -> io::Result<()> {
	for signum in [libc::SIGINT, libc::SIGTERM] {
		// SAFETY: the handler only touches atomics, which is async-signal-safe
		let result = unsafe {
			let mut action: libc::sigaction = std::mem::zeroed();
			action.sa_sigaction = on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
			action.sa_flags = libc::SA_RESTART;
			libc::sigemptyset(&mut action.sa_mask);
			libc::sigaction(signum, &action, std::ptr::null_mut())
		};

		if result != 0 {
			return Err(io::Error::last_os_error());
		}
	}

	Ok(())
}

#[cfg(not(unix))]
fn install_platform_handler() -> io::Result<()> {
	// ctrlc runs the closure on its own thread, not in signal context
	ctrlc::set_handler(record_interrupt).map_err(|e| io::Error::other(e.to_string()))
}

/// Number of interrupt signals received so far
pub fn interrupt_count() -> usize {
	INTERRUPT_COUNT.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cancel_is_shared_and_idempotent() {
		let token = CancellationToken::new();
		let observer = token.clone();
		assert!(!observer.is_cancelled());

		token.cancel();
		token.cancel();
		assert!(observer.is_cancelled());
	}
}
