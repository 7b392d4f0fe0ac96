//! Frames exchanged between a [`Channel`](crate::Channel) and the relay.
//!
//! Inbound traffic arrives as [`Chunk`]s that may or may not end a message;
//! outbound traffic is always a whole [`Message`]. The asymmetry is what lets
//! the relay guarantee that nothing is forwarded before it is fully assembled.

use bridge_protocol::CloseReason;

/// Payload type of a data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
	Text,
	Binary,
}

/// One delivery from a transport. `end_of_message` marks the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
	pub kind: MessageKind,
	pub data: Vec<u8>,
	pub end_of_message: bool,
}

impl Chunk {
	pub fn text(data: impl Into<String>, end_of_message: bool) -> Self {
		Self {
			kind: MessageKind::Text,
			data: data.into().into_bytes(),
			end_of_message,
		}
	}

	pub fn binary(data: impl Into<Vec<u8>>, end_of_message: bool) -> Self {
		Self {
			kind: MessageKind::Binary,
			data: data.into(),
			end_of_message,
		}
	}
}

/// What a channel yields when read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
	Chunk(Chunk),
	/// Peer closed. `None` when the close frame carried no payload.
	Close(Option<CloseReason>),
}

impl Inbound {
	/// A complete text message in a single chunk.
	pub fn text(data: impl Into<String>) -> Self {
		Inbound::Chunk(Chunk::text(data, true))
	}

	/// A complete binary message in a single chunk.
	pub fn binary(data: impl Into<Vec<u8>>) -> Self {
		Inbound::Chunk(Chunk::binary(data, true))
	}

	pub fn close(code: u16, reason: impl Into<String>) -> Self {
		Inbound::Close(Some(CloseReason::new(code, reason)))
	}
}

/// A fully assembled data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
	Text(String),
	Binary(Vec<u8>),
}

impl Message {
	pub fn len(&self) -> usize {
		match self {
			Message::Text(text) => text.len(),
			Message::Binary(data) => data.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// What the relay writes to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
	Message(Message),
	Close(Option<CloseReason>),
}

impl Outbound {
	pub fn text(data: impl Into<String>) -> Self {
		Outbound::Message(Message::Text(data.into()))
	}

	pub fn close(code: u16, reason: impl Into<String>) -> Self {
		Outbound::Close(Some(CloseReason::new(code, reason)))
	}
}
