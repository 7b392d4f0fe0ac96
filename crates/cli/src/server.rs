//! The bridge server instance.
//!
//! [`BridgeServer`] owns the registry, the session table, and the shutdown
//! trigger. `start` binds and spawns the HTTP server at most once; `shutdown`
//! signals every session and in-flight launch, stops accepting, and waits a
//! bounded time for live sessions to drain.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use axum::Router;
use axum::routing::get;
use bridge_runtime::{ShutdownSignal, ShutdownTrigger, shutdown_channel};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::discovery::{self, LAUNCH_PATH};
use crate::handshake;
use crate::registry::TargetRegistry;
use crate::sessions::SessionTable;

/// How long `shutdown` waits for live sessions to finish their closes.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Per-request view of the server, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
	pub config: Arc<BridgeConfig>,
	pub registry: Arc<TargetRegistry>,
	pub sessions: Arc<SessionTable>,
	pub shutdown: ShutdownSignal,
	/// host:port used in discovery URLs.
	pub advertised: Arc<str>,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/", get(|| async { "OK" }))
		.route("/json", get(discovery::list))
		.route("/json/list", get(discovery::list))
		.route("/json/version", get(discovery::version))
		.route("/devtools/page/{page_id}", get(handshake::direct_attach))
		.route(LAUNCH_PATH, get(handshake::launch_attach))
		.with_state(state)
}

struct Running {
	addr: SocketAddr,
	task: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
}

pub struct BridgeServer {
	config: Arc<BridgeConfig>,
	registry: Arc<TargetRegistry>,
	sessions: Arc<SessionTable>,
	trigger: ShutdownTrigger,
	running: OnceCell<Running>,
}

impl BridgeServer {
	pub fn new(config: BridgeConfig) -> Self {
		let registry = Arc::new(TargetRegistry::from_targets(config.targets.iter().cloned()));
		let (trigger, _) = shutdown_channel();
		Self {
			config: Arc::new(config),
			registry,
			sessions: Arc::new(SessionTable::new()),
			trigger,
			running: OnceCell::new(),
		}
	}

	pub fn config(&self) -> &BridgeConfig {
		&self.config
	}

	pub fn registry(&self) -> &Arc<TargetRegistry> {
		&self.registry
	}

	pub fn sessions(&self) -> &Arc<SessionTable> {
		&self.sessions
	}

	/// Bound address, once started.
	pub fn local_addr(&self) -> Option<SocketAddr> {
		self.running.get().map(|running| running.addr)
	}

	/// Binds and starts serving. Later calls return the same address without
	/// binding again.
	pub async fn start(&self) -> Result<SocketAddr> {
		let running = self.running.get_or_try_init(|| self.bind()).await?;
		Ok(running.addr)
	}

	async fn bind(&self) -> Result<Running> {
		if self.trigger.is_triggered() {
			bail!("Bridge server was already shut down");
		}

		let listener = TcpListener::bind(self.config.listen)
			.await
			.with_context(|| format!("Failed to bind debugger bridge to {}", self.config.listen))?;
		let addr = listener.local_addr().context("Failed to read bound address")?;
		let advertised: Arc<str> = match &self.config.public_host {
			Some(host) => host.as_str().into(),
			None => addr.to_string().into(),
		};

		let app = router(AppState {
			config: Arc::clone(&self.config),
			registry: Arc::clone(&self.registry),
			sessions: Arc::clone(&self.sessions),
			shutdown: self.trigger.subscribe(),
			advertised: Arc::clone(&advertised),
		});

		let mut signal = self.trigger.subscribe();
		let task = tokio::spawn(async move {
			axum::serve(listener, app.into_make_service())
				.with_graceful_shutdown(async move { signal.wait().await })
				.await
		});

		info!(
			target = "dbgbridge",
			%addr,
			%advertised,
			targets = self.registry.len(),
			app = ?self.config.app,
			"debugger bridge listening"
		);
		Ok(Running {
			addr,
			task: Mutex::new(Some(task)),
		})
	}

	/// Stops the server. Safe to call more than once, and before `start`.
	pub async fn shutdown(&self) -> Result<()> {
		self.trigger.trigger();

		let task = self.running.get().and_then(|running| running.task.lock().take());
		let Some(task) = task else {
			return Ok(());
		};
		info!(target = "dbgbridge", live = self.sessions.len(), "shutting down");

		let served = task.await.context("Bridge server task panicked")?;
		if !self.sessions.drained(SHUTDOWN_GRACE).await {
			warn!(
				target = "dbgbridge",
				remaining = self.sessions.len(),
				grace_ms = SHUTDOWN_GRACE.as_millis() as u64,
				"sessions still open after shutdown grace period"
			);
			for (id, info) in self.sessions.snapshot() {
				warn!(
					target = "dbgbridge",
					session = %id,
					target_id = %info.target,
					phase = ?info.phase,
					age_ms = info.started.elapsed().as_millis() as u64,
					"session outlived shutdown"
				);
			}
		}
		served.context("Bridge server error")
	}

	/// Starts, waits for SIGINT/SIGTERM (Ctrl+C elsewhere), then shuts down.
	pub async fn run_until_signal(&self) -> Result<()> {
		self.start().await?;
		let signal = wait_for_signal().await?;
		info!(target = "dbgbridge", signal, "received signal, shutting down");
		self.shutdown().await
	}
}

impl Drop for BridgeServer {
	fn drop(&mut self) {
		self.trigger.trigger();
	}
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str> {
	use tokio::signal::unix::{SignalKind, signal};

	let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
	let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
	tokio::select! {
		_ = sigterm.recv() => Ok("SIGTERM"),
		_ = sigint.recv() => Ok("SIGINT"),
	}
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str> {
	tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
	Ok("Ctrl+C")
}
