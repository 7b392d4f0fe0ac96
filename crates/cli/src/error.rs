use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bridge_protocol::CloseReason;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Request-level failures surfaced by the HTTP handlers.
///
/// Only failures that happen before the WebSocket upgrade become HTTP
/// responses. After the upgrade, failures are reported to the client as a
/// close frame built from the runtime error.
#[derive(Debug, Error)]
pub enum BridgeError {
	/// The request asked for an attach endpoint without a WebSocket upgrade.
	#[error("WebSocket upgrade required: {0}")]
	ProtocolUpgradeRequired(String),

	/// Host or Origin header not allowed to attach.
	#[error("attach refused for {0}")]
	Forbidden(String),

	/// Launch requested without an app and none is configured.
	#[error("no app to launch: pass ?app=<path> or start the bridge with --app")]
	MissingApp,

	/// The server is stopping and no longer accepts sessions.
	#[error("debugger bridge is shutting down")]
	ShuttingDown,

	#[error(transparent)]
	Runtime(#[from] bridge_runtime::Error),
}

impl BridgeError {
	pub fn status(&self) -> StatusCode {
		match self {
			BridgeError::ProtocolUpgradeRequired(_) | BridgeError::MissingApp => StatusCode::BAD_REQUEST,
			BridgeError::Forbidden(_) => StatusCode::FORBIDDEN,
			BridgeError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
			BridgeError::Runtime(err) if err.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
			BridgeError::Runtime(bridge_runtime::Error::BackendUnreachable { .. }) => StatusCode::BAD_GATEWAY,
			BridgeError::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Close frame sent to an upgraded client whose session could not be opened.
	pub fn close_reason(&self) -> CloseReason {
		match self {
			BridgeError::ShuttingDown => CloseReason::going_away(self.to_string()),
			BridgeError::Runtime(bridge_runtime::Error::BackendUnreachable { .. }) => {
				CloseReason::internal_error("backend unreachable")
			}
			BridgeError::Runtime(bridge_runtime::Error::LaunchAborted { .. }) => {
				CloseReason::going_away("debugger bridge shutting down")
			}
			_ => CloseReason::internal_error(self.to_string()),
		}
	}

	/// Handshake phase the failure belongs to, for logs.
	pub fn phase(&self) -> &'static str {
		match self {
			BridgeError::MissingApp
			| BridgeError::Runtime(
				bridge_runtime::Error::LaunchFailed { .. }
				| bridge_runtime::Error::LaunchTimeout { .. }
				| bridge_runtime::Error::LaunchAborted { .. },
			) => "launch",
			_ => "handshake",
		}
	}
}

impl IntoResponse for BridgeError {
	fn into_response(self) -> Response {
		(self.status(), self.to_string()).into_response()
	}
}
