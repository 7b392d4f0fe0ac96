use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "dbgbridge")]
#[command(about = "Debugger bridge - attach debugger front-ends to running or freshly launched debuggees")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Address to listen on
	#[arg(long, env = "DBGBRIDGE_LISTEN", default_value = "127.0.0.1:9300")]
	pub listen: SocketAddr,

	/// host:port advertised in discovery URLs (defaults to the bound address)
	#[arg(long, env = "DBGBRIDGE_PUBLIC_HOST")]
	pub public_host: Option<String>,

	/// Browser origins allowed to attach besides loopback and devtools pages (`*` for any)
	#[arg(long, env = "DBGBRIDGE_ALLOW_ORIGIN", value_name = "ORIGIN", value_delimiter = ',')]
	pub allow_origin: Vec<String>,

	/// Backend base URL for page ids missing from the target registry
	#[arg(long, env = "DBGBRIDGE_BACKEND_BASE", default_value = "ws://localhost:9222")]
	pub backend_base: String,

	/// JSON file with an array of targets to list and attach to
	#[arg(long, env = "DBGBRIDGE_TARGETS", value_name = "FILE")]
	pub targets: Option<PathBuf>,

	/// Default application for launch-and-connect
	#[arg(long, env = "DBGBRIDGE_APP", value_name = "PATH")]
	pub app: Option<PathBuf>,

	/// Default executable for launch-and-connect, looked up on PATH
	#[arg(long, env = "DBGBRIDGE_RUNTIME", value_name = "EXE", default_value = "node")]
	pub runtime: String,

	/// Flag passed before the app so the debuggee waits for a debugger
	#[arg(long, env = "DBGBRIDGE_DEBUG_FLAG", default_value = bridge_runtime::launch::DEFAULT_DEBUG_FLAG, allow_hyphen_values = true)]
	pub debug_flag: String,

	/// Launch the runtime without a debug flag
	#[arg(long, conflicts_with = "debug_flag")]
	pub no_debug_flag: bool,

	/// Prefix of the output line announcing the debugger address
	#[arg(long, env = "DBGBRIDGE_READY_MARKER", default_value = bridge_runtime::launch::DEFAULT_READY_MARKER)]
	pub ready_marker: String,

	/// Scheme that starts the address inside the announcement line
	#[arg(long, env = "DBGBRIDGE_ADDRESS_SCHEME", default_value = bridge_runtime::launch::DEFAULT_ADDRESS_SCHEME)]
	pub address_scheme: String,

	/// How long a launched debuggee has to announce its address
	#[arg(long, env = "DBGBRIDGE_LAUNCH_TIMEOUT_MS", default_value_t = 2000)]
	pub launch_timeout_ms: u64,

	/// Bound on connecting to a backend
	#[arg(long, env = "DBGBRIDGE_CONNECT_TIMEOUT_MS", default_value_t = 5000)]
	pub connect_timeout_ms: u64,

	/// Bound on each close issued while tearing a session down
	#[arg(long, env = "DBGBRIDGE_CLOSE_TIMEOUT_MS", default_value_t = 1000)]
	pub close_timeout_ms: u64,

	/// Largest message relayed in either direction
	#[arg(long, env = "DBGBRIDGE_MAX_MESSAGE_BYTES", default_value_t = bridge_runtime::relay::DEFAULT_MAX_MESSAGE_BYTES)]
	pub max_message_bytes: usize,

	/// Send a bare close instead of mirroring the peer's close code and reason
	#[arg(long, env = "DBGBRIDGE_NO_MIRROR_CLOSE")]
	pub no_mirror_close: bool,

	/// Product string reported by /json/version
	#[arg(long, env = "DBGBRIDGE_PRODUCT", default_value = "node.js/v9.11.1")]
	pub product: String,

	/// Protocol version reported by /json/version
	#[arg(long, env = "DBGBRIDGE_PROTOCOL_VERSION", default_value = "1.1")]
	pub protocol_version: String,
}
