//! Directional message pump.
//!
//! A session runs two pumps, one per [`Direction`]. Each pump only ever waits
//! on its source; chunks are coalesced by a [`MessageAssembler`] and forwarded
//! as whole messages, so per-direction order and message boundaries survive
//! the relay unchanged.

use std::fmt;
use std::time::Duration;

use bridge_protocol::CloseReason;
use futures::{SinkExt, StreamExt};
use tracing::{debug, trace};

use crate::assembler::MessageAssembler;
use crate::channel::{FrameSink, FrameStream};
use crate::error::Error;
use crate::frame::{Inbound, Outbound};

/// Default upper bound on one assembled message.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 << 20;

/// Default bound on issuing a close during teardown.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Relay behaviour knobs.
#[derive(Debug, Clone)]
pub struct RelayConfig {
	/// Forward the peer's close code and reason verbatim. When off, the
	/// destination receives a close frame without payload.
	pub mirror_close: bool,
	/// Bound on each close issued while tearing a session down.
	pub close_timeout: Duration,
	pub max_message_bytes: usize,
}

impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			mirror_close: true,
			close_timeout: DEFAULT_CLOSE_TIMEOUT,
			max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	ClientToBackend,
	BackendToClient,
}

impl fmt::Display for Direction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Direction::ClientToBackend => "client->backend",
			Direction::BackendToClient => "backend->client",
		})
	}
}

/// Why a pump stopped.
#[derive(Debug)]
pub(crate) enum PumpExit {
	/// Source sent a close; `mirrored` reports whether the destination got its copy.
	Closed {
		reason: Option<CloseReason>,
		mirrored: bool,
	},
	/// Source stream ended without a close frame.
	Ended,
	Failed(Error),
}

/// Forwards messages from `source` to `destination` until close, end, or error.
pub(crate) async fn pump(
	direction: Direction,
	source: &mut FrameStream,
	destination: &mut FrameSink,
	config: &RelayConfig,
) -> PumpExit {
	let mut assembler = MessageAssembler::new(config.max_message_bytes);
	let mut forwarded: u64 = 0;

	loop {
		let inbound = match source.next().await {
			Some(Ok(inbound)) => inbound,
			Some(Err(err)) => return PumpExit::Failed(err),
			None => {
				debug!(target = "dbgbridge.relay", %direction, forwarded, "source ended");
				discard_partial(&assembler, direction);
				return PumpExit::Ended;
			}
		};

		match inbound {
			Inbound::Chunk(chunk) => {
				let message = match assembler.push(chunk) {
					Ok(Some(message)) => message,
					Ok(None) => continue,
					Err(err) => return PumpExit::Failed(err),
				};
				trace!(target = "dbgbridge.relay", %direction, bytes = message.len(), "forward");
				if let Err(err) = destination.send(Outbound::Message(message)).await {
					return PumpExit::Failed(err);
				}
				forwarded += 1;
			}
			Inbound::Close(reason) => {
				debug!(
					target = "dbgbridge.relay",
					%direction,
					forwarded,
					close = ?reason,
					"source closed"
				);
				discard_partial(&assembler, direction);
				let mirror = if config.mirror_close { reason.clone() } else { None };
				let mirrored = matches!(
					tokio::time::timeout(
						config.close_timeout,
						destination.send(Outbound::Close(mirror))
					)
					.await,
					Ok(Ok(()))
				);
				return PumpExit::Closed { reason, mirrored };
			}
		}
	}
}

fn discard_partial(assembler: &MessageAssembler, direction: Direction) {
	if assembler.is_assembling() {
		debug!(
			target = "dbgbridge.relay",
			%direction,
			pending_bytes = assembler.pending_bytes(),
			"incomplete message discarded"
		);
	}
}
