//! Outbound connection to a debuggee's debug endpoint.

use std::time::Duration;

use bridge_protocol::CloseReason;
use futures::{SinkExt, StreamExt, future};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::debug;

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::frame::{Inbound, Message, Outbound};

/// Default bound on the outbound connect, including the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a WebSocket to `url` and wraps it as a [`Channel`].
///
/// Messages and frames from the backend are accepted up to `max_message_bytes`.
pub async fn connect(url: &str, timeout: Duration, max_message_bytes: usize) -> Result<Channel> {
	let config = WebSocketConfig::default()
		.max_message_size(Some(max_message_bytes))
		.max_frame_size(Some(max_message_bytes));
	let attempt = tokio::time::timeout(
		timeout,
		tokio_tungstenite::connect_async_with_config(url, Some(config), false),
	)
	.await;
	let (stream, response) = match attempt {
		Ok(Ok(connected)) => connected,
		Ok(Err(err)) => {
			return Err(Error::BackendUnreachable {
				url: url.to_string(),
				reason: err.to_string(),
			});
		}
		Err(_) => {
			return Err(Error::BackendUnreachable {
				url: url.to_string(),
				reason: format!("connect timed out after {}ms", timeout.as_millis()),
			});
		}
	};
	debug!(target = "dbgbridge.handshake", %url, status = %response.status(), "backend connected");
	Ok(websocket_channel(stream))
}

/// Adapts a tungstenite stream into a [`Channel`].
///
/// Tungstenite reassembles fragmented frames itself, so every data message
/// arrives as a single final chunk. Ping/pong are answered by tungstenite and
/// never reach the relay.
pub fn websocket_channel<S>(stream: WebSocketStream<S>) -> Channel
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	let (sink, stream) = stream.split();
	let sink = sink
		.sink_map_err(Error::from)
		.with(|frame: Outbound| future::ready(Ok::<_, Error>(to_ws(frame))));
	let stream = stream.filter_map(|item| {
		future::ready(match item {
			Ok(message) => from_ws(message).map(Ok),
			Err(err) => Some(Err(Error::from(err))),
		})
	});
	Channel::new(sink, stream)
}

fn from_ws(message: WsMessage) -> Option<Inbound> {
	match message {
		WsMessage::Text(text) => Some(Inbound::text(text.as_str())),
		WsMessage::Binary(data) => Some(Inbound::binary(data.to_vec())),
		WsMessage::Close(frame) => Some(Inbound::Close(frame.map(|f| {
			CloseReason::new(u16::from(f.code), f.reason.as_str())
		}))),
		WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => None,
	}
}

fn to_ws(frame: Outbound) -> WsMessage {
	match frame {
		Outbound::Message(Message::Text(text)) => WsMessage::text(text),
		Outbound::Message(Message::Binary(data)) => WsMessage::binary(data),
		Outbound::Close(reason) => WsMessage::Close(reason.map(|r| CloseFrame {
			code: CloseCode::from(r.code),
			reason: r.reason.into(),
		})),
	}
}
