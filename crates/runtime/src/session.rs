//! One active bridge between a front-end client and a debuggee backend.
//!
//! A [`Session`] owns both channels and, on the launch path, the debuggee
//! process. [`Session::run`] drives the two directional pumps concurrently and
//! returns once either side closes, fails, or the host shuts down. Whichever
//! pump finishes first ends the other one, so the two never outlive each other
//! by more than the bounded teardown closes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bridge_protocol::CloseReason;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::channel::{Channel, finish};
use crate::error::Error;
use crate::launch::LaunchedProcess;
use crate::relay::{Direction, PumpExit, RelayConfig, pump};
use crate::shutdown::ShutdownSignal;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
	pub fn next() -> Self {
		Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "session-{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Handshaking,
	Relaying,
	Closing,
	Closed,
}

/// Endpoint of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
	Client,
	Backend,
}

impl fmt::Display for Side {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Side::Client => "client",
			Side::Backend => "backend",
		})
	}
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
	/// `by` sent a close frame, which was mirrored to the other side.
	Closed {
		by: Side,
		reason: Option<CloseReason>,
	},
	/// `side` went away without a close frame.
	Disconnected { side: Side },
	/// Transport failure while relaying in `direction`.
	Failed { direction: Direction, error: Error },
	/// Host shutdown.
	Shutdown,
}

pub struct Session {
	id: SessionId,
	target: String,
	client: Channel,
	backend: Channel,
	process: Option<LaunchedProcess>,
	config: RelayConfig,
	state: watch::Sender<SessionState>,
}

impl Session {
	/// Creates a session over two open channels. `id` is allocated by the
	/// caller so other tables can be keyed before the session exists; `target`
	/// names the debug target for logs (page id or launched program).
	pub fn new(id: SessionId, target: impl Into<String>, client: Channel, backend: Channel, config: RelayConfig) -> Self {
		let (state, _) = watch::channel(SessionState::Handshaking);
		Self {
			id,
			target: target.into(),
			client,
			backend,
			process: None,
			config,
			state,
		}
	}

	/// Transfers ownership of a launched debuggee to this session. The process
	/// is killed and reaped when the session ends.
	pub fn with_process(mut self, process: LaunchedProcess) -> Self {
		self.process = Some(process);
		self
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	pub fn target(&self) -> &str {
		&self.target
	}

	/// Observes state transitions; the last value is `Closed` once `run` returns.
	pub fn state(&self) -> watch::Receiver<SessionState> {
		self.state.subscribe()
	}

	/// Relays until either side closes or fails, or `shutdown` fires.
	pub async fn run(self, mut shutdown: ShutdownSignal) -> SessionEnd {
		let Session {
			id,
			target,
			client,
			backend,
			process,
			config,
			state,
		} = self;

		let (mut client_sink, mut client_stream) = client.into_parts();
		let (mut backend_sink, mut backend_stream) = backend.into_parts();

		state.send_replace(SessionState::Relaying);
		info!(target = "dbgbridge.relay", session = %id, target_id = %target, "session relaying");

		let outcome = {
			let upstream = pump(Direction::ClientToBackend, &mut client_stream, &mut backend_sink, &config);
			let downstream = pump(Direction::BackendToClient, &mut backend_stream, &mut client_sink, &config);
			tokio::select! {
				exit = upstream => Some((Direction::ClientToBackend, exit)),
				exit = downstream => Some((Direction::BackendToClient, exit)),
				_ = shutdown.wait() => None,
			}
		};

		state.send_replace(SessionState::Closing);

		let (end, client_close, backend_close) = match outcome {
			Some((direction, PumpExit::Closed { reason, mirrored })) => {
				// Mirrored close already went out; the closing side's transport
				// answers the peer's close itself.
				let by = source_side(direction);
				if !mirrored {
					debug!(target = "dbgbridge.relay", session = %id, target_id = %target, %direction, "mirrored close not delivered");
				}
				(SessionEnd::Closed { by, reason }, None, None)
			}
			Some((direction, PumpExit::Ended)) => {
				let side = source_side(direction);
				let close = CloseReason::internal_error(format!("{side} connection lost"));
				(SessionEnd::Disconnected { side }, Some(Some(close.clone())), Some(Some(close)))
			}
			Some((direction, PumpExit::Failed(error))) => {
				let close = error.close_reason();
				(
					SessionEnd::Failed { direction, error },
					Some(Some(close.clone())),
					Some(Some(close)),
				)
			}
			None => {
				let close = CloseReason::going_away("debugger bridge shutting down");
				(SessionEnd::Shutdown, Some(Some(close.clone())), Some(Some(close)))
			}
		};

		tokio::join!(
			finish(&mut client_sink, client_close, config.close_timeout),
			finish(&mut backend_sink, backend_close, config.close_timeout),
		);
		drop((client_sink, client_stream, backend_sink, backend_stream));

		if let Some(process) = process {
			let pid = process.pid();
			if let Err(err) = process.shutdown().await {
				warn!(target = "dbgbridge.launch", session = %id, target_id = %target, ?pid, error = %err, "failed to stop debuggee");
			}
		}

		match &end {
			SessionEnd::Closed { by, reason } if reason.as_ref().is_some_and(CloseReason::is_error) => {
				warn!(target = "dbgbridge.relay", session = %id, target_id = %target, phase = "relay", %by, close = ?reason, "session closed with error");
			}
			SessionEnd::Closed { by, reason } => {
				info!(target = "dbgbridge.relay", session = %id, target_id = %target, %by, close = ?reason, "session closed");
			}
			SessionEnd::Disconnected { side } => {
				warn!(target = "dbgbridge.relay", session = %id, target_id = %target, phase = "relay", %side, "peer disconnected without close");
			}
			SessionEnd::Failed { direction, error } => {
				warn!(target = "dbgbridge.relay", session = %id, target_id = %target, phase = "relay", %direction, error = %error, "session failed");
			}
			SessionEnd::Shutdown => {
				debug!(target = "dbgbridge.relay", session = %id, target_id = %target, "session stopped by shutdown");
			}
		}

		state.send_replace(SessionState::Closed);
		end
	}
}

fn source_side(direction: Direction) -> Side {
	match direction {
		Direction::ClientToBackend => Side::Client,
		Direction::BackendToClient => Side::Backend,
	}
}

#[cfg(test)]
mod tests;
