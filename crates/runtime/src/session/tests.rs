use std::time::Duration;

use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};

use super::*;
use crate::frame::{Chunk, Inbound, Outbound};
use crate::shutdown::shutdown_channel;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Test-side handle of an in-memory channel: `tx` feeds what the session
/// reads, `rx` captures what the session writes.
struct Peer {
	tx: mpsc::UnboundedSender<crate::error::Result<Inbound>>,
	rx: mpsc::UnboundedReceiver<Outbound>,
}

impl Peer {
	fn send(&self, inbound: Inbound) {
		self.tx.unbounded_send(Ok(inbound)).unwrap();
	}

	async fn next(&mut self) -> Outbound {
		tokio::time::timeout(TIMEOUT, self.rx.next())
			.await
			.expect("timeout waiting for frame")
			.expect("channel ended")
	}

	/// Frames written after the last `next`, up to and including the channel end.
	async fn rest(&mut self) -> Vec<Outbound> {
		let mut out = Vec::new();
		while let Ok(Some(frame)) = tokio::time::timeout(TIMEOUT, self.rx.next()).await {
			out.push(frame);
		}
		out
	}
}

fn memory_channel() -> (Channel, Peer) {
	let (in_tx, in_rx) = mpsc::unbounded();
	let (out_tx, out_rx) = mpsc::unbounded();
	let channel = Channel::new(out_tx.sink_map_err(|_| Error::ChannelClosed), in_rx);
	(channel, Peer { tx: in_tx, rx: out_rx })
}

fn session() -> (Session, Peer, Peer) {
	let (client, client_peer) = memory_channel();
	let (backend, backend_peer) = memory_channel();
	let session = Session::new(SessionId::next(), "page-1", client, backend, RelayConfig::default());
	(session, client_peer, backend_peer)
}

#[tokio::test]
async fn attach_scenario_relays_both_ways_and_mirrors_close() {
	let (session, mut client, mut backend) = session();
	let mut state = session.state();
	assert_eq!(*state.borrow(), SessionState::Handshaking);

	let task = tokio::spawn(session.run(ShutdownSignal::never()));

	client.send(Inbound::text(r#"{"method":"Debugger.enable"}"#));
	assert_eq!(backend.next().await, Outbound::text(r#"{"method":"Debugger.enable"}"#));

	backend.send(Inbound::text(r#"{"id":1,"result":{}}"#));
	assert_eq!(client.next().await, Outbound::text(r#"{"id":1,"result":{}}"#));

	client.send(Inbound::close(1000, "done"));
	assert_eq!(backend.next().await, Outbound::close(1000, "done"));

	let end = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
	match end {
		SessionEnd::Closed { by, reason } => {
			assert_eq!(by, Side::Client);
			assert_eq!(reason, Some(CloseReason::new(1000, "done")));
		}
		other => panic!("unexpected end: {other:?}"),
	}

	state.wait_for(|s| *s == SessionState::Closed).await.unwrap();
	// Both channels were released: the capture sinks are gone.
	assert!(client.rest().await.is_empty());
	assert!(backend.rest().await.is_empty());
}

#[tokio::test]
async fn order_and_boundaries_hold_in_both_directions_concurrently() {
	let (session, mut client, mut backend) = session();
	let task = tokio::spawn(session.run(ShutdownSignal::never()));

	let count = 200;
	let up: Vec<String> = (0..count).map(|i| format!(r#"{{"id":{i},"method":"Runtime.evaluate"}}"#)).collect();
	let down: Vec<String> = (0..count).map(|i| format!(r#"{{"id":{i},"result":{{}}}}"#)).collect();

	for (u, d) in up.iter().zip(&down) {
		// Split every other message into two chunks to exercise coalescing.
		if u.len() % 2 == 0 {
			let (a, b) = u.split_at(3);
			client.send(Inbound::Chunk(Chunk::text(a, false)));
			client.send(Inbound::Chunk(Chunk::text(b, true)));
		} else {
			client.send(Inbound::text(u.clone()));
		}
		backend.send(Inbound::text(d.clone()));
	}

	let (seen_up, seen_down) = tokio::join!(
		async {
			let mut seen = Vec::new();
			for _ in 0..count {
				seen.push(backend.next().await);
			}
			seen
		},
		async {
			let mut seen = Vec::new();
			for _ in 0..count {
				seen.push(client.next().await);
			}
			seen
		}
	);

	let expected_up: Vec<Outbound> = up.into_iter().map(Outbound::text).collect();
	let expected_down: Vec<Outbound> = down.into_iter().map(Outbound::text).collect();
	assert_eq!(seen_up, expected_up);
	assert_eq!(seen_down, expected_down);

	backend.send(Inbound::close(1001, "target gone"));
	assert_eq!(client.next().await, Outbound::close(1001, "target gone"));
	let end = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
	assert!(matches!(end, SessionEnd::Closed { by: Side::Backend, .. }));
}

#[tokio::test]
async fn transport_error_closes_both_sides() {
	let (session, mut client, mut backend) = session();
	let task = tokio::spawn(session.run(ShutdownSignal::never()));

	backend
		.tx
		.unbounded_send(Err(Error::Transport("connection reset".into())))
		.unwrap();

	let end = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
	match &end {
		SessionEnd::Failed { direction, error } => {
			assert_eq!(*direction, Direction::BackendToClient);
			assert!(error.is_transport());
		}
		other => panic!("unexpected end: {other:?}"),
	}

	let client_frames = client.rest().await;
	let backend_frames = backend.rest().await;
	assert!(matches!(client_frames.as_slice(), [Outbound::Close(Some(c))] if c.code == 1011));
	assert!(matches!(backend_frames.as_slice(), [Outbound::Close(Some(c))] if c.code == 1011));
}

#[tokio::test]
async fn vanished_client_tears_down_backend() {
	let (session, client, mut backend) = session();
	let task = tokio::spawn(session.run(ShutdownSignal::never()));

	let Peer { tx, rx: _rx } = client;
	drop(tx);

	let end = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
	assert!(matches!(end, SessionEnd::Disconnected { side: Side::Client }));
	let frames = backend.rest().await;
	assert!(matches!(frames.as_slice(), [Outbound::Close(Some(c))] if c.code == 1011));
}

#[tokio::test]
async fn shutdown_sends_going_away_to_both_sides() {
	let (session, mut client, mut backend) = session();
	let (trigger, signal) = shutdown_channel();
	let task = tokio::spawn(session.run(signal));

	client.send(Inbound::text("ping"));
	assert_eq!(backend.next().await, Outbound::text("ping"));

	trigger.trigger();
	let end = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
	assert!(matches!(end, SessionEnd::Shutdown));

	for frames in [client.rest().await, backend.rest().await] {
		assert!(matches!(frames.as_slice(), [Outbound::Close(Some(c))] if c.code == 1001));
	}
}

#[tokio::test]
async fn session_ids_are_unique() {
	let (a, _, _) = session();
	let (b, _, _) = session();
	assert_ne!(a.id(), b.id());
	assert!(a.id().to_string().starts_with("session-"));
	assert_eq!(a.target(), "page-1");
}

#[test]
fn session_keeps_the_allocated_id() {
	let id = SessionId::next();
	let (client, _client_peer) = memory_channel();
	let (backend, _backend_peer) = memory_channel();
	let session = Session::new(id, "page-2", client, backend, RelayConfig::default());
	assert_eq!(session.id(), id);
	assert_eq!(session.target(), "page-2");
}

#[cfg(unix)]
#[tokio::test]
async fn launched_process_is_stopped_with_session() {
	use crate::launch::{LaunchSpec, launch};

	let spec = LaunchSpec::new("sh")
		.debug_flag(None)
		.args(["-c", "echo 'Debugger listening on ws://127.0.0.1:9/x' >&2; exec sleep 30"])
		.deadline(Duration::from_secs(5));
	let process = launch(&spec, &mut ShutdownSignal::never()).await.unwrap();
	let pid = process.pid().unwrap();

	let (session, client, _backend) = session();
	let session = session.with_process(process);
	let task = tokio::spawn(session.run(ShutdownSignal::never()));

	client.send(Inbound::close(1000, "done"));
	tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();

	#[cfg(target_os = "linux")]
	assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
	let _ = pid;
}
