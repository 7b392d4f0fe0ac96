//! Chunk-to-message coalescing.

use crate::error::{Error, Result};
use crate::frame::{Chunk, Message, MessageKind};

/// Buffers chunks until a transport-reported end-of-message boundary.
///
/// The first chunk of a message fixes its kind; continuation chunks are
/// appended regardless of the kind they report. Exceeding `limit` discards
/// the partial message and fails.
#[derive(Debug)]
pub struct MessageAssembler {
	kind: Option<MessageKind>,
	buffer: Vec<u8>,
	limit: usize,
}

impl MessageAssembler {
	pub fn new(limit: usize) -> Self {
		Self {
			kind: None,
			buffer: Vec::new(),
			limit,
		}
	}

	/// Adds a chunk, returning the assembled message once its boundary is seen.
	pub fn push(&mut self, chunk: Chunk) -> Result<Option<Message>> {
		let kind = *self.kind.get_or_insert(chunk.kind);

		if self.buffer.len() + chunk.data.len() > self.limit {
			self.reset();
			return Err(Error::MessageTooLarge { limit: self.limit });
		}

		if !chunk.end_of_message {
			self.buffer.extend_from_slice(&chunk.data);
			return Ok(None);
		}

		let data = if self.buffer.is_empty() {
			chunk.data
		} else {
			self.buffer.extend_from_slice(&chunk.data);
			std::mem::take(&mut self.buffer)
		};
		self.kind = None;

		match kind {
			MessageKind::Text => String::from_utf8(data)
				.map(|text| Some(Message::Text(text)))
				.map_err(|_| Error::InvalidUtf8),
			MessageKind::Binary => Ok(Some(Message::Binary(data))),
		}
	}

	/// Bytes buffered for a message whose boundary has not arrived yet.
	pub fn pending_bytes(&self) -> usize {
		self.buffer.len()
	}

	/// True when a partial message is buffered.
	pub fn is_assembling(&self) -> bool {
		self.kind.is_some()
	}

	pub fn reset(&mut self) {
		self.kind = None;
		self.buffer = Vec::new();
	}
}
