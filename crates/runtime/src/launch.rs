//! Launch-and-attach orchestration.
//!
//! Starts a debuggee suspended at its first instruction and scans its
//! diagnostic output (stderr) for the announcement line carrying the backend
//! address, e.g. `Debugger listening on ws://127.0.0.1:9229/abc`.
//!
//! The scan runs as its own task and resolves a oneshot at most once; the
//! caller races that oneshot against the deadline. On every failure path the
//! process is killed and reaped before the error is returned. If the caller
//! drops the launch future instead, the [`PendingLaunch`] destructor kills the
//! process and reaps it on a background task.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::shutdown::ShutdownSignal;

/// Deadline for the ready announcement.
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(2000);

/// Flag that makes the debuggee wait for a debugger on an ephemeral port.
pub const DEFAULT_DEBUG_FLAG: &str = "--inspect-brk=localhost:0";

/// Prefix of the announcement line.
pub const DEFAULT_READY_MARKER: &str = "Debugger listening on ";

/// Scheme that starts the address inside the announcement line.
pub const DEFAULT_ADDRESS_SCHEME: &str = "ws://";

/// Everything needed to start a debuggee and recognise its announcement.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
	pub program: PathBuf,
	pub args: Vec<OsString>,
	pub working_dir: Option<PathBuf>,
	/// Inserted before `args`; `None` launches the program unmodified.
	pub debug_flag: Option<String>,
	pub ready_marker: String,
	pub address_scheme: String,
	pub deadline: Duration,
}

impl LaunchSpec {
	pub fn new(program: impl Into<PathBuf>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
			working_dir: None,
			debug_flag: Some(DEFAULT_DEBUG_FLAG.to_string()),
			ready_marker: DEFAULT_READY_MARKER.to_string(),
			address_scheme: DEFAULT_ADDRESS_SCHEME.to_string(),
			deadline: DEFAULT_DEADLINE,
		}
	}

	pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
		self.args.push(arg.into());
		self
	}

	pub fn args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<OsString>,
	{
		self.args.extend(args.into_iter().map(Into::into));
		self
	}

	pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.working_dir = Some(dir.into());
		self
	}

	pub fn debug_flag(mut self, flag: Option<String>) -> Self {
		self.debug_flag = flag;
		self
	}

	pub fn ready_marker(mut self, marker: impl Into<String>) -> Self {
		self.ready_marker = marker.into();
		self
	}

	pub fn address_scheme(mut self, scheme: impl Into<String>) -> Self {
		self.address_scheme = scheme.into();
		self
	}

	pub fn deadline(mut self, deadline: Duration) -> Self {
		self.deadline = deadline;
		self
	}

	/// Program name for logs and errors.
	pub fn program_name(&self) -> String {
		program_name(&self.program)
	}
}

fn program_name(program: &Path) -> String {
	program.display().to_string()
}

/// Extracts the backend address from an announcement line.
///
/// The line must start with `marker`; the address runs from the first
/// occurrence of `scheme` to the end of the line, trailing whitespace removed.
pub fn extract_address<'a>(line: &'a str, marker: &str, scheme: &str) -> Option<&'a str> {
	if !line.starts_with(marker) {
		return None;
	}
	let start = line.find(scheme)?;
	let address = line[start..].trim_end();
	(address.len() > scheme.len()).then_some(address)
}

/// Starts the debuggee described by `spec` and waits for its announcement.
///
/// Fails with [`Error::LaunchTimeout`] when no announcement arrives before
/// the deadline (or the output ends first), and with [`Error::LaunchAborted`]
/// when `shutdown` fires. The process is terminated on both paths.
pub async fn launch(spec: &LaunchSpec, shutdown: &mut ShutdownSignal) -> Result<LaunchedProcess> {
	let pending = PendingLaunch::spawn(spec)?;
	tokio::select! {
		result = pending.wait_ready() => result,
		_ = shutdown.wait() => {
			info!(target = "dbgbridge.launch", program = %spec.program_name(), "launch aborted by shutdown");
			Err(Error::LaunchAborted { program: spec.program_name() })
		}
	}
}

/// A spawned debuggee whose announcement has not been seen yet.
pub struct PendingLaunch {
	program: String,
	pid: Option<u32>,
	child: Option<Child>,
	readers: Vec<JoinHandle<()>>,
	ready: oneshot::Receiver<String>,
	deadline: Instant,
	deadline_ms: u64,
}

impl PendingLaunch {
	/// Spawns the process and its output readers. The deadline starts now.
	pub fn spawn(spec: &LaunchSpec) -> Result<Self> {
		let program = spec.program_name();

		let mut cmd = Command::new(&spec.program);
		if let Some(flag) = &spec.debug_flag {
			cmd.arg(flag);
		}
		cmd.args(&spec.args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);
		if let Some(dir) = &spec.working_dir {
			cmd.current_dir(dir);
		}

		let mut child = cmd.spawn().map_err(|e| Error::LaunchFailed {
			program: program.clone(),
			reason: e.to_string(),
		})?;
		let pid = child.id();
		info!(target = "dbgbridge.launch", %program, ?pid, deadline_ms = spec.deadline.as_millis() as u64, "debuggee spawned");

		let (ready_tx, ready_rx) = oneshot::channel();
		let mut readers = Vec::with_capacity(2);
		if let Some(stderr) = child.stderr.take() {
			readers.push(scan_output(
				stderr,
				"stderr",
				program.clone(),
				Some(Announcement {
					marker: spec.ready_marker.clone(),
					scheme: spec.address_scheme.clone(),
					tx: ready_tx,
				}),
			));
		}
		if let Some(stdout) = child.stdout.take() {
			readers.push(scan_output(stdout, "stdout", program.clone(), None));
		}

		Ok(Self {
			program,
			pid,
			child: Some(child),
			readers,
			ready: ready_rx,
			deadline: Instant::now() + spec.deadline,
			deadline_ms: spec.deadline.as_millis() as u64,
		})
	}

	pub fn pid(&self) -> Option<u32> {
		self.pid
	}

	/// Waits for the announcement, racing the deadline.
	pub async fn wait_ready(mut self) -> Result<LaunchedProcess> {
		let exited = match tokio::time::timeout_at(self.deadline, &mut self.ready).await {
			Ok(Ok(address)) => {
				info!(target = "dbgbridge.launch", program = %self.program, pid = ?self.pid, %address, "debuggee ready");
				return Ok(self.promote(address));
			}
			// Scanner finished without a match: the output stream closed.
			Ok(Err(_)) => true,
			Err(_) => false,
		};

		warn!(
			target = "dbgbridge.launch",
			program = %self.program,
			pid = ?self.pid,
			phase = "launch",
			exited,
			deadline_ms = self.deadline_ms,
			"no debugger announcement; terminating debuggee"
		);
		self.terminate().await;
		Err(Error::LaunchTimeout {
			program: self.program.clone(),
			deadline_ms: self.deadline_ms,
			pid: self.pid,
			exited,
		})
	}

	async fn terminate(&mut self) {
		for reader in self.readers.drain(..) {
			reader.abort();
		}
		if let Some(child) = self.child.take() {
			let status = kill_and_reap(child).await;
			debug!(target = "dbgbridge.launch", program = %self.program, pid = ?self.pid, ?status, "debuggee terminated");
		}
	}

	fn promote(mut self, address: String) -> LaunchedProcess {
		LaunchedProcess {
			program: std::mem::take(&mut self.program),
			pid: self.pid,
			address,
			child: self.child.take(),
			readers: std::mem::take(&mut self.readers),
		}
	}
}

impl Drop for PendingLaunch {
	fn drop(&mut self) {
		release(self.child.take(), &mut self.readers);
	}
}

/// A debuggee that announced its backend address.
///
/// Output keeps being drained so the debuggee never blocks on a full pipe.
/// Dropping the handle kills the process.
#[derive(Debug)]
pub struct LaunchedProcess {
	program: String,
	pid: Option<u32>,
	address: String,
	child: Option<Child>,
	readers: Vec<JoinHandle<()>>,
}

impl LaunchedProcess {
	/// Backend address extracted from the announcement.
	pub fn backend_url(&self) -> &str {
		&self.address
	}

	pub fn pid(&self) -> Option<u32> {
		self.pid
	}

	/// Kills the process, waits for it to exit, and releases the handle.
	pub async fn shutdown(mut self) -> Result<Option<ExitStatus>> {
		for reader in self.readers.drain(..) {
			reader.abort();
		}
		match self.child.take() {
			Some(child) => {
				let status = kill_and_reap(child).await?;
				debug!(target = "dbgbridge.launch", program = %self.program, pid = ?self.pid, %status, "debuggee stopped");
				Ok(Some(status))
			}
			None => Ok(None),
		}
	}
}

impl Drop for LaunchedProcess {
	fn drop(&mut self) {
		release(self.child.take(), &mut self.readers);
	}
}

struct Announcement {
	marker: String,
	scheme: String,
	tx: oneshot::Sender<String>,
}

/// Reads `stream` line by line, logging each line and resolving `announce`
/// with the first matching address. Keeps draining after the match.
fn scan_output<R>(stream: R, name: &'static str, program: String, announce: Option<Announcement>) -> JoinHandle<()>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	tokio::spawn(async move {
		let mut announce = announce;
		let mut lines = LinesStream::new(BufReader::new(stream).lines());
		while let Some(line) = lines.next().await {
			let line = match line {
				Ok(line) => line,
				Err(err) => {
					debug!(target = "dbgbridge.launch", %program, stream = name, error = %err, "output read failed");
					break;
				}
			};
			debug!(target = "dbgbridge.launch", %program, stream = name, "{line}");

			let address = announce
				.as_ref()
				.and_then(|a| extract_address(&line, &a.marker, &a.scheme))
				.map(str::to_owned);
			if let Some(address) = address {
				if let Some(a) = announce.take() {
					let _ = a.tx.send(address);
				}
			}
		}
	})
}

async fn kill_and_reap(mut child: Child) -> std::io::Result<ExitStatus> {
	if let Err(err) = child.start_kill() {
		// Already exited; wait() still reaps it.
		debug!(target = "dbgbridge.launch", error = %err, "kill failed");
	}
	child.wait().await
}

fn release(child: Option<Child>, readers: &mut Vec<JoinHandle<()>>) {
	for reader in readers.drain(..) {
		reader.abort();
	}
	let Some(mut child) = child else {
		return;
	};
	let _ = child.start_kill();
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		handle.spawn(async move {
			let _ = child.wait().await;
		});
	}
}
