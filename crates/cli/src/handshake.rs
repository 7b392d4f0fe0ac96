//! Attach handlers.
//!
//! Both routes follow the same order: reject non-upgrade requests and
//! disallowed Host/Origin headers before any work, resolve the backend,
//! upgrade, connect out, then hand both channels to
//! a [`Session`]. Once the client is upgraded, every failure is reported to it
//! as a close frame; it is never left open without a counterpart.
//!
//! The launch route starts the debuggee after the upgrade, so a launch that
//! never announces still completes the upgrade and then closes it.

use std::path::PathBuf;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use axum::extract::{Path as RoutePath, Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use bridge_protocol::CloseReason;
use bridge_runtime::{
	Channel, Inbound, LaunchSpec, LaunchedProcess, Message, Outbound, Session, SessionEnd, SessionId, backend,
	launch,
};
use futures::{SinkExt, StreamExt, future};
use serde::Deserialize;
use tracing::{info, warn};

use crate::access;
use crate::config::resolve_program;
use crate::discovery::{LAUNCH_TARGET_ID, launched_target};
use crate::error::{BridgeError, Result};
use crate::server::AppState;
use crate::sessions::{SessionGuard, SessionPhase};

/// Query of the launch route. Both fall back to the configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct LaunchParams {
	pub exec: Option<String>,
	pub app: Option<PathBuf>,
}

/// `GET /devtools/page/{page_id}`
pub async fn direct_attach(
	State(state): State<AppState>,
	RoutePath(page_id): RoutePath<String>,
	uri: Uri,
	headers: HeaderMap,
	ws: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response> {
	let ws = ws.map_err(|rejection| upgrade_required(&page_id, rejection))?;
	allow(&state, &headers, &page_id)?;
	if state.shutdown.is_triggered() {
		return Err(BridgeError::ShuttingDown);
	}

	let backend_url = match state.registry.backend_for(&page_id) {
		Some(url) => url,
		None => state.config.fallback_backend(uri.path()),
	};

	let guard = state.sessions.track(SessionId::next(), page_id.as_str(), SessionPhase::Connecting);
	info!(target = "dbgbridge.handshake", session = %guard.id(), target_id = %page_id, backend = %backend_url, "attach requested");

	Ok(upgrade(ws, &state).on_upgrade(move |socket| async move {
		let client = client_channel(socket);
		attach(state, guard, page_id, client, backend_url).await;
	}))
}

/// `GET /launch-and-connect?exec=<EXE>&app=<PATH>`
pub async fn launch_attach(
	State(state): State<AppState>,
	Query(params): Query<LaunchParams>,
	headers: HeaderMap,
	ws: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response> {
	let ws = ws.map_err(|rejection| upgrade_required(LAUNCH_TARGET_ID, rejection))?;
	allow(&state, &headers, LAUNCH_TARGET_ID)?;
	if state.shutdown.is_triggered() {
		return Err(BridgeError::ShuttingDown);
	}

	let app = params.app.or_else(|| state.config.app.clone()).ok_or_else(|| {
		warn!(target = "dbgbridge.handshake", target_id = LAUNCH_TARGET_ID, phase = "launch", "no app to launch");
		BridgeError::MissingApp
	})?;
	let exec = params.exec.unwrap_or_else(|| state.config.runtime.clone());
	let program = {
		let exec_owned = exec.clone();
		tokio::task::spawn_blocking(move || resolve_program(&exec_owned))
			.await
			.unwrap_or_else(|_| PathBuf::from(&exec))
	};
	let spec = state.config.launch_spec(program, &app);

	let guard = state.sessions.track(SessionId::next(), app.display().to_string(), SessionPhase::Launching);
	info!(
		target = "dbgbridge.handshake",
		session = %guard.id(),
		target_id = %app.display(),
		program = %spec.program_name(),
		"launch requested"
	);

	Ok(upgrade(ws, &state).on_upgrade(move |socket| async move {
		let client = client_channel(socket);
		launch_and_attach(state, guard, spec, app, client).await;
	}))
}

fn allow(state: &AppState, headers: &HeaderMap, target: &str) -> Result<()> {
	access::check(headers, &state.config).map_err(|refused| {
		warn!(target = "dbgbridge.handshake", target_id = %target, phase = "handshake", %refused, "attach refused");
		BridgeError::Forbidden(refused)
	})
}

fn upgrade_required(target: &str, rejection: WebSocketUpgradeRejection) -> BridgeError {
	warn!(target = "dbgbridge.handshake", target_id = %target, phase = "handshake", reason = %rejection, "not a WebSocket upgrade");
	BridgeError::ProtocolUpgradeRequired(rejection.to_string())
}

fn upgrade(ws: WebSocketUpgrade, state: &AppState) -> WebSocketUpgrade {
	let limit = state.config.relay.max_message_bytes;
	ws.max_message_size(limit).max_frame_size(limit)
}

async fn attach(state: AppState, guard: SessionGuard, target: String, client: Channel, backend_url: String) {
	let limit = state.config.relay.max_message_bytes;
	let backend = match backend::connect(&backend_url, state.config.connect_timeout, limit).await {
		Ok(backend) => backend,
		Err(err) => {
			reject(&state, &guard, &target, client, err.into()).await;
			return;
		}
	};
	relay(&state, &guard, target, client, backend, None).await;
}

async fn launch_and_attach(state: AppState, guard: SessionGuard, spec: LaunchSpec, app: PathBuf, client: Channel) {
	let target = app.display().to_string();
	let mut shutdown = state.shutdown.clone();
	let process = match launch(&spec, &mut shutdown).await {
		Ok(process) => process,
		Err(err) => {
			reject(&state, &guard, &target, client, err.into()).await;
			return;
		}
	};

	// Listed for as long as the session is live.
	let _registration = state.registry.register(launched_target(guard.id(), &app, process.backend_url()));
	guard.set_phase(SessionPhase::Connecting);

	let limit = state.config.relay.max_message_bytes;
	let backend = match backend::connect(process.backend_url(), state.config.connect_timeout, limit).await {
		Ok(backend) => backend,
		Err(err) => {
			stop(process, guard.id(), &target).await;
			reject(&state, &guard, &target, client, err.into()).await;
			return;
		}
	};
	relay(&state, &guard, target, client, backend, Some(process)).await;
}

async fn relay(
	state: &AppState,
	guard: &SessionGuard,
	target: String,
	client: Channel,
	backend: Channel,
	process: Option<LaunchedProcess>,
) -> SessionEnd {
	let mut session = Session::new(guard.id(), target, client, backend, state.config.relay.clone());
	if let Some(process) = process {
		session = session.with_process(process);
	}
	guard.set_phase(SessionPhase::Relaying);
	session.run(state.shutdown.clone()).await
}

/// Closes an upgraded client whose session could not be opened.
async fn reject(state: &AppState, guard: &SessionGuard, target: &str, client: Channel, err: BridgeError) {
	let close = err.close_reason();
	warn!(
		target = "dbgbridge.handshake",
		session = %guard.id(),
		target_id = %target,
		phase = err.phase(),
		error = %err,
		close = %close,
		"session not opened"
	);
	client.close(Some(close), state.config.relay.close_timeout).await;
}

async fn stop(process: LaunchedProcess, session: SessionId, target: &str) {
	let pid = process.pid();
	if let Err(err) = process.shutdown().await {
		warn!(target = "dbgbridge.launch", %session, target_id = %target, ?pid, phase = "launch", error = %err, "failed to stop debuggee");
	}
}

/// Adapts an upgraded axum socket into a [`Channel`].
pub fn client_channel(socket: WebSocket) -> Channel {
	let (sink, stream) = socket.split();
	let sink = sink
		.sink_map_err(|err| bridge_runtime::Error::Transport(err.to_string()))
		.with(|frame: Outbound| future::ready(Ok::<_, bridge_runtime::Error>(to_axum(frame))));
	let stream = stream.filter_map(|item| {
		future::ready(match item {
			Ok(message) => from_axum(message).map(Ok),
			Err(err) => Some(Err(bridge_runtime::Error::Transport(err.to_string()))),
		})
	});
	Channel::new(sink, stream)
}

fn from_axum(message: WsMessage) -> Option<Inbound> {
	match message {
		WsMessage::Text(text) => Some(Inbound::text(text.as_str())),
		WsMessage::Binary(data) => Some(Inbound::binary(data.to_vec())),
		WsMessage::Close(frame) => Some(Inbound::Close(
			frame.map(|f| CloseReason::new(f.code, f.reason.as_str())),
		)),
		WsMessage::Ping(_) | WsMessage::Pong(_) => None,
	}
}

fn to_axum(frame: Outbound) -> WsMessage {
	match frame {
		Outbound::Message(Message::Text(text)) => WsMessage::Text(text.into()),
		Outbound::Message(Message::Binary(data)) => WsMessage::Binary(data.into()),
		Outbound::Close(reason) => WsMessage::Close(reason.map(|r| CloseFrame {
			code: r.code,
			reason: r.reason.into(),
		})),
	}
}
