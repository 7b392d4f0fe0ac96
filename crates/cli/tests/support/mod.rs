//! Shared fixtures: a bridge on an ephemeral port, a scriptable fake backend,
//! and WebSocket client helpers.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use bridge_cli::{BridgeConfig, BridgeServer};
use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_hdr_async};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type Backend = WebSocketStream<TcpStream>;

pub fn test_config() -> BridgeConfig {
	BridgeConfig {
		listen: SocketAddr::from(([127, 0, 0, 1], 0)),
		..BridgeConfig::default()
	}
}

pub async fn start(config: BridgeConfig) -> (BridgeServer, SocketAddr) {
	let server = BridgeServer::new(config);
	let addr = server.start().await.unwrap();
	(server, addr)
}

/// Listens for one backend connection. The handle resolves to the request
/// path the bridge connected with and the accepted socket.
pub async fn fake_backend() -> (SocketAddr, JoinHandle<(String, Backend)>) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let accept = tokio::spawn(async move {
		let (socket, _) = listener.accept().await.unwrap();
		let mut path = String::new();
		let ws = accept_hdr_async(socket, |req: &Request, resp: Response| {
			path = req.uri().path().to_string();
			Ok(resp)
		})
		.await
		.unwrap();
		(path, ws)
	});
	(addr, accept)
}

/// An address with nothing listening on it.
pub async fn dead_address() -> SocketAddr {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);
	addr
}

pub async fn connect(url: &str) -> Client {
	let (ws, _) = tokio::time::timeout(TIMEOUT, tokio_tungstenite::connect_async(url))
		.await
		.expect("timeout connecting")
		.expect("connect failed");
	ws
}

/// Like [`connect`], accepting messages up to `max_bytes`.
pub async fn connect_with_limit(url: &str, max_bytes: usize) -> Client {
	let config = WebSocketConfig::default()
		.max_message_size(Some(max_bytes))
		.max_frame_size(Some(max_bytes));
	let (ws, _) = tokio::time::timeout(TIMEOUT, tokio_tungstenite::connect_async_with_config(url, Some(config), false))
		.await
		.expect("timeout connecting")
		.expect("connect failed");
	ws
}

/// Next data or close message, skipping ping/pong.
pub async fn next_message<S>(ws: &mut WebSocketStream<S>) -> Message
where
	S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
	loop {
		let message = tokio::time::timeout(TIMEOUT, ws.next())
			.await
			.expect("timeout waiting for message")
			.expect("stream ended")
			.expect("transport error");
		match message {
			Message::Ping(_) | Message::Pong(_) => continue,
			other => return other,
		}
	}
}

pub fn close(code: u16, reason: &'static str) -> Message {
	Message::Close(Some(CloseFrame {
		code: code.into(),
		reason: Utf8Bytes::from_static(reason),
	}))
}

/// Code and reason of a close message.
pub fn close_parts(message: &Message) -> (u16, String) {
	match message {
		Message::Close(Some(frame)) => (u16::from(frame.code), frame.reason.as_str().to_string()),
		other => panic!("expected close frame, got {other:?}"),
	}
}

/// Drives a socket until the peer finishes the close handshake.
pub async fn drain<S>(ws: &mut WebSocketStream<S>)
where
	S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
	let _ = tokio::time::timeout(TIMEOUT, async { while let Some(Ok(_)) = ws.next().await {} }).await;
}

pub async fn wait_drained(server: &BridgeServer) {
	assert!(server.sessions().drained(TIMEOUT).await, "sessions still live");
}
