//! Transport-agnostic duplex channel.
//!
//! A [`Channel`] is one end of a session: frames go out through a boxed sink
//! and come in through a boxed stream. Adapters for concrete WebSocket types
//! live next to the code that owns them ([`crate::backend`] for the outbound
//! tungstenite connection, the server crate for inbound upgrades).

use std::pin::Pin;
use std::time::Duration;

use bridge_protocol::CloseReason;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::frame::{Inbound, Outbound};

pub type FrameSink = Pin<Box<dyn Sink<Outbound, Error = Error> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Inbound>> + Send>>;

/// One open duplex connection, exclusively owned by its session.
pub struct Channel {
	sink: FrameSink,
	stream: FrameStream,
}

impl Channel {
	pub fn new<Si, St>(sink: Si, stream: St) -> Self
	where
		Si: Sink<Outbound, Error = Error> + Send + 'static,
		St: Stream<Item = Result<Inbound>> + Send + 'static,
	{
		Self {
			sink: Box::pin(sink),
			stream: Box::pin(stream),
		}
	}

	pub fn into_parts(self) -> (FrameSink, FrameStream) {
		(self.sink, self.stream)
	}

	pub async fn send(&mut self, frame: Outbound) -> Result<()> {
		self.sink.send(frame).await
	}

	pub async fn recv(&mut self) -> Option<Result<Inbound>> {
		self.stream.next().await
	}

	/// Sends `reason` as a close frame and shuts the channel, bounded by `timeout`.
	///
	/// Used on handshake failure paths where the inbound channel must not be
	/// left open without a counterpart.
	pub async fn close(mut self, reason: Option<CloseReason>, timeout: Duration) {
		finish(&mut self.sink, Some(reason), timeout).await;
	}
}

/// Completes a sink during teardown.
///
/// With `frame = Some(..)` a close frame is sent first; with `None` the sink is
/// only flushed and closed (a close was already sent, or the transport answers
/// the peer's close on its own). Errors are logged and swallowed: teardown is
/// best-effort once the session is ending.
pub(crate) async fn finish(
	sink: &mut FrameSink,
	frame: Option<Option<CloseReason>>,
	timeout: Duration,
) -> bool {
	let work = async {
		if let Some(reason) = frame {
			sink.send(Outbound::Close(reason)).await?;
		}
		sink.close().await
	};
	match tokio::time::timeout(timeout, work).await {
		Ok(Ok(())) => true,
		Ok(Err(err)) => {
			debug!(target = "dbgbridge.relay", error = %err, "close failed");
			false
		}
		Err(_) => {
			debug!(target = "dbgbridge.relay", timeout_ms = timeout.as_millis() as u64, "close timed out");
			false
		}
	}
}
