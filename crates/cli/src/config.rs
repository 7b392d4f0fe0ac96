//! Resolved server configuration.
//!
//! [`BridgeConfig`] is built once from the parsed [`Cli`] and validated up
//! front; everything downstream reads it through a shared reference.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bridge_protocol::{TargetDescriptor, VersionInfo};
use bridge_runtime::backend::DEFAULT_CONNECT_TIMEOUT;
use bridge_runtime::launch::{DEFAULT_ADDRESS_SCHEME, DEFAULT_DEADLINE, DEFAULT_DEBUG_FLAG, DEFAULT_READY_MARKER};
use bridge_runtime::{LaunchSpec, RelayConfig};
use tracing::debug;

use crate::cli::Cli;
use crate::discovery::LAUNCH_TARGET_ID;

/// Prefix of the ids launched debuggees are listed under.
const SESSION_ID_PREFIX: &str = "session-";

#[derive(Debug, Clone)]
pub struct BridgeConfig {
	pub listen: SocketAddr,
	/// host:port advertised in discovery URLs; `None` uses the bound address.
	pub public_host: Option<String>,
	/// Extra browser origins allowed to open attach sockets; `*` allows any.
	pub allowed_origins: Vec<String>,
	/// Base URL for page ids missing from the registry, without trailing slash.
	pub backend_base: String,
	/// Targets seeded into the registry at startup.
	pub targets: Vec<TargetDescriptor>,
	pub app: Option<PathBuf>,
	pub runtime: String,
	pub debug_flag: Option<String>,
	pub ready_marker: String,
	pub address_scheme: String,
	pub launch_timeout: Duration,
	pub connect_timeout: Duration,
	pub relay: RelayConfig,
	pub version: VersionInfo,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			listen: SocketAddr::from(([127, 0, 0, 1], 9300)),
			public_host: None,
			allowed_origins: Vec::new(),
			backend_base: "ws://localhost:9222".to_string(),
			targets: Vec::new(),
			app: None,
			runtime: "node".to_string(),
			debug_flag: Some(DEFAULT_DEBUG_FLAG.to_string()),
			ready_marker: DEFAULT_READY_MARKER.to_string(),
			address_scheme: DEFAULT_ADDRESS_SCHEME.to_string(),
			launch_timeout: DEFAULT_DEADLINE,
			connect_timeout: DEFAULT_CONNECT_TIMEOUT,
			relay: RelayConfig::default(),
			version: VersionInfo {
				browser: "node.js/v9.11.1".to_string(),
				protocol_version: "1.1".to_string(),
			},
		}
	}
}

impl BridgeConfig {
	pub fn from_cli(cli: &Cli) -> Result<Self> {
		let targets = match &cli.targets {
			Some(path) => load_targets(path)?,
			None => Vec::new(),
		};

		let config = Self {
			listen: cli.listen,
			public_host: cli.public_host.clone(),
			allowed_origins: cli.allow_origin.clone(),
			backend_base: cli.backend_base.trim_end_matches('/').to_string(),
			targets,
			app: cli.app.clone(),
			runtime: cli.runtime.clone(),
			debug_flag: (!cli.no_debug_flag).then(|| cli.debug_flag.clone()),
			ready_marker: cli.ready_marker.clone(),
			address_scheme: cli.address_scheme.clone(),
			launch_timeout: Duration::from_millis(cli.launch_timeout_ms),
			connect_timeout: Duration::from_millis(cli.connect_timeout_ms),
			relay: RelayConfig {
				mirror_close: !cli.no_mirror_close,
				close_timeout: Duration::from_millis(cli.close_timeout_ms),
				max_message_bytes: cli.max_message_bytes,
			},
			version: VersionInfo {
				browser: cli.product.clone(),
				protocol_version: cli.protocol_version.clone(),
			},
		};
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		let base = url::Url::parse(&self.backend_base)
			.with_context(|| format!("Invalid backend base URL: {}", self.backend_base))?;
		if base.scheme() != "ws" {
			bail!("Backend base URL must use ws://, got {}", self.backend_base);
		}
		if self.ready_marker.is_empty() {
			bail!("Ready marker must not be empty");
		}
		if self.address_scheme.is_empty() {
			bail!("Address scheme must not be empty");
		}
		if self.launch_timeout.is_zero() {
			bail!("Launch timeout must be greater than zero");
		}
		if self.relay.max_message_bytes == 0 {
			bail!("Maximum message size must be greater than zero");
		}

		let mut seen = std::collections::HashSet::new();
		for target in &self.targets {
			if target.id.is_empty() {
				bail!("Target with empty id in targets file");
			}
			if target.id == LAUNCH_TARGET_ID || target.id.starts_with(SESSION_ID_PREFIX) {
				bail!("Target id is reserved for launched debuggees: {}", target.id);
			}
			if !seen.insert(target.id.as_str()) {
				bail!("Duplicate target id: {}", target.id);
			}
		}
		Ok(())
	}

	/// Backend address for a direct-attach request whose id is not registered.
	pub fn fallback_backend(&self, path: &str) -> String {
		format!("{}{}", self.backend_base, path)
	}

	/// Builds the launch for `app` under `program`.
	///
	/// The debuggee runs in the app's parent directory.
	pub fn launch_spec(&self, program: PathBuf, app: &Path) -> LaunchSpec {
		let mut spec = LaunchSpec::new(program)
			.debug_flag(self.debug_flag.clone())
			.ready_marker(self.ready_marker.clone())
			.address_scheme(self.address_scheme.clone())
			.deadline(self.launch_timeout)
			.arg(app.as_os_str());
		if let Some(dir) = app.parent().filter(|dir| !dir.as_os_str().is_empty()) {
			spec = spec.working_dir(dir);
		}
		spec
	}
}

/// Reads a JSON array of targets.
pub fn load_targets(path: &Path) -> Result<Vec<TargetDescriptor>> {
	let raw = std::fs::read_to_string(path)
		.with_context(|| format!("Failed to read targets file: {}", path.display()))?;
	let targets: Vec<TargetDescriptor> = serde_json::from_str(&raw)
		.with_context(|| format!("Failed to parse targets file: {}", path.display()))?;
	debug!(target = "dbgbridge", path = %path.display(), count = targets.len(), "loaded targets");
	Ok(targets)
}

/// Resolves an executable name through PATH, keeping the name as given when
/// it cannot be found so the spawn reports the failure.
pub fn resolve_program(name: &str) -> PathBuf {
	which::which(name).unwrap_or_else(|_| PathBuf::from(name))
}
