//! Launch-and-attach with `sh` standing in for the debuggee runtime.

#![cfg(unix)]

mod support;

use std::path::Path;
use std::time::Duration;

use futures::SinkExt;
use serde_json::Value;
use support::*;
use tokio_tungstenite::tungstenite::Message;

/// Script that announces `address` on stderr, then blocks like a suspended
/// debuggee.
fn announcing_script(dir: &Path, address: &str) -> std::path::PathBuf {
	let script = dir.join("announce.sh");
	std::fs::write(
		&script,
		format!("echo 'starting' >&2\necho 'Debugger listening on {address}' >&2\nexec sleep 30\n"),
	)
	.unwrap();
	script
}

fn launch_config(app: Option<&Path>) -> bridge_cli::BridgeConfig {
	let mut config = test_config();
	config.runtime = "sh".into();
	config.debug_flag = None;
	config.app = app.map(Path::to_path_buf);
	config
}

async fn list(addr: std::net::SocketAddr) -> Vec<Value> {
	reqwest::get(format!("http://{addr}/json/list"))
		.await
		.unwrap()
		.json::<Vec<Value>>()
		.await
		.unwrap()
}

#[tokio::test]
async fn launched_debuggee_is_relayed_and_listed_while_live() {
	let dir = tempfile::tempdir().unwrap();
	let (backend_addr, accepted) = fake_backend().await;
	let script = announcing_script(dir.path(), &format!("ws://{backend_addr}/abc"));
	let (server, addr) = start(launch_config(Some(&script))).await;

	let mut client = connect(&format!("ws://{addr}/launch-and-connect")).await;
	let (path, mut backend) = tokio::time::timeout(TIMEOUT, accepted).await.unwrap().unwrap();
	assert_eq!(path, "/abc");

	client.send(Message::text(r#"{"id":1,"method":"Runtime.runIfWaitingForDebugger"}"#)).await.unwrap();
	assert_eq!(
		next_message(&mut backend).await,
		Message::text(r#"{"id":1,"method":"Runtime.runIfWaitingForDebugger"}"#)
	);
	backend.send(Message::text(r#"{"id":1,"result":{}}"#)).await.unwrap();
	assert_eq!(next_message(&mut client).await, Message::text(r#"{"id":1,"result":{}}"#));

	// The configured app plus the live launched session.
	let records = list(addr).await;
	assert_eq!(records.len(), 2);
	let launched = records
		.iter()
		.find(|r| r["id"].as_str().unwrap().starts_with("session-"))
		.expect("launched target listed");
	assert_eq!(launched["title"], "announce.sh");
	assert!(launched["url"].as_str().unwrap().starts_with("file://"));

	client.send(close(1000, "done")).await.unwrap();
	assert_eq!(close_parts(&next_message(&mut backend).await), (1000, "done".to_string()));
	drain(&mut client).await;
	drain(&mut backend).await;
	wait_drained(&server).await;

	let records = list(addr).await;
	assert_eq!(records.len(), 1);
	assert_eq!(records[0]["id"], "launch-and-connect");

	server.shutdown().await.unwrap();
}

#[tokio::test]
async fn query_parameters_override_configured_launch() {
	let dir = tempfile::tempdir().unwrap();
	let (backend_addr, accepted) = fake_backend().await;
	let script = announcing_script(dir.path(), &format!("ws://{backend_addr}/override"));

	let mut config = launch_config(None);
	config.runtime = "/nonexistent/runtime".into();
	let (server, addr) = start(config).await;

	let url = format!("ws://{addr}/launch-and-connect?exec=sh&app={}", script.display());
	let mut client = connect(&url).await;
	let (path, mut backend) = tokio::time::timeout(TIMEOUT, accepted).await.unwrap().unwrap();
	assert_eq!(path, "/override");

	backend.send(close(1001, "debuggee exited")).await.unwrap();
	assert_eq!(close_parts(&next_message(&mut client).await), (1001, "debuggee exited".to_string()));
	drain(&mut client).await;
	drain(&mut backend).await;
	wait_drained(&server).await;
	server.shutdown().await.unwrap();
}

#[tokio::test]
async fn silent_debuggee_times_out_after_upgrade() {
	let dir = tempfile::tempdir().unwrap();
	let script = dir.path().join("silent.sh");
	std::fs::write(&script, "exec sleep 30\n").unwrap();

	let mut config = launch_config(Some(&script));
	config.launch_timeout = Duration::from_millis(300);
	let (server, addr) = start(config).await;

	let started = std::time::Instant::now();
	let mut client = connect(&format!("ws://{addr}/launch-and-connect")).await;
	let (code, reason) = close_parts(&next_message(&mut client).await);
	assert_eq!(code, 1011);
	assert!(reason.contains("did not announce"), "{reason}");
	assert!(started.elapsed() < Duration::from_secs(3));

	drain(&mut client).await;
	wait_drained(&server).await;
	assert!(server.registry().is_empty());
	server.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_runtime_closes_client() {
	let dir = tempfile::tempdir().unwrap();
	let script = dir.path().join("app.js");
	std::fs::write(&script, "").unwrap();

	let mut config = launch_config(Some(&script));
	config.runtime = "/nonexistent/dbgbridge-runtime".into();
	let (server, addr) = start(config).await;

	let mut client = connect(&format!("ws://{addr}/launch-and-connect")).await;
	let (code, reason) = close_parts(&next_message(&mut client).await);
	assert_eq!(code, 1011);
	assert!(reason.contains("Failed to launch"), "{reason}");

	drain(&mut client).await;
	wait_drained(&server).await;
	server.shutdown().await.unwrap();
}

#[tokio::test]
async fn unreachable_announced_backend_closes_client() {
	let dir = tempfile::tempdir().unwrap();
	let dead = dead_address().await;
	let script = announcing_script(dir.path(), &format!("ws://{dead}/gone"));
	let (server, addr) = start(launch_config(Some(&script))).await;

	let mut client = connect(&format!("ws://{addr}/launch-and-connect")).await;
	let (code, reason) = close_parts(&next_message(&mut client).await);
	assert_eq!(code, 1011);
	assert_eq!(reason, "backend unreachable");

	drain(&mut client).await;
	wait_drained(&server).await;
	assert!(server.registry().is_empty());
	server.shutdown().await.unwrap();
}
