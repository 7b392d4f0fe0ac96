//! Error types for the bridge runtime.

use bridge_protocol::{CloseReason, close};
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while launching, connecting, or relaying.
#[derive(Debug, Error)]
pub enum Error {
	/// Failed to spawn the debuggee process.
	#[error("Failed to launch {program}: {reason}")]
	LaunchFailed { program: String, reason: String },

	/// No ready announcement was observed before the deadline.
	///
	/// `exited` is set when the output stream ended before the deadline, which
	/// happens when the process dies without announcing. The process has been
	/// killed and reaped by the time this error is returned.
	#[error("{program} did not announce a debugger address within {deadline_ms}ms")]
	LaunchTimeout {
		program: String,
		deadline_ms: u64,
		pid: Option<u32>,
		exited: bool,
	},

	/// The launch was abandoned because the host is shutting down.
	#[error("Launch of {program} aborted by shutdown")]
	LaunchAborted { program: String },

	/// Outbound connect to the backend failed or timed out.
	#[error("Backend {url} unreachable: {reason}")]
	BackendUnreachable { url: String, reason: String },

	/// Read or write failure on a channel.
	#[error("Transport error: {0}")]
	Transport(String),

	/// Assembled message exceeded the configured limit.
	#[error("Message exceeds {limit} bytes")]
	MessageTooLarge { limit: usize },

	/// Text message payload was not valid UTF-8.
	#[error("Text message is not valid UTF-8")]
	InvalidUtf8,

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Returns true if this is a launch timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::LaunchTimeout { .. })
	}

	/// Returns true if this error came from a channel rather than a launch.
	pub fn is_transport(&self) -> bool {
		matches!(
			self,
			Error::Transport(_)
				| Error::MessageTooLarge { .. }
				| Error::InvalidUtf8
				| Error::ChannelClosed
				| Error::Io(_)
		)
	}

	/// Close frame to send to a peer when a session is torn down because of this error.
	pub fn close_reason(&self) -> CloseReason {
		match self {
			Error::MessageTooLarge { .. } => CloseReason::new(close::TOO_BIG, self.to_string()),
			Error::InvalidUtf8 => CloseReason::new(close::INVALID_PAYLOAD, self.to_string()),
			_ => CloseReason::internal_error(self.to_string()),
		}
	}
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		use tokio_tungstenite::tungstenite::Error as WsError;
		match err {
			WsError::ConnectionClosed | WsError::AlreadyClosed => Error::ChannelClosed,
			other => Error::Transport(other.to_string()),
		}
	}
}
