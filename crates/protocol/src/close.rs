//! Close-frame payloads.
//!
//! A close frame is a control frame and may carry at most 125 payload bytes:
//! two for the code and up to 123 for the UTF-8 reason. [`CloseReason::new`]
//! truncates longer reasons on a character boundary so a reason built from an
//! arbitrary error message can always be put on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum reason length in bytes for a close frame.
pub const MAX_REASON_BYTES: usize = 123;

/// Normal closure.
pub const NORMAL: u16 = 1000;
/// Endpoint is going away (server shutdown).
pub const GOING_AWAY: u16 = 1001;
/// Payload inconsistent with the message type (bad UTF-8 in text).
pub const INVALID_PAYLOAD: u16 = 1007;
/// Message too large to process.
pub const TOO_BIG: u16 = 1009;
/// Unexpected condition prevented the request from being fulfilled.
pub const INTERNAL_ERROR: u16 = 1011;

/// Close code and reason observed on, or sent to, a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CloseReason {
	pub code: u16,
	pub reason: String,
}

impl CloseReason {
	/// Creates a close reason, truncating `reason` to [`MAX_REASON_BYTES`].
	pub fn new(code: u16, reason: impl Into<String>) -> Self {
		let mut reason = reason.into();
		if reason.len() > MAX_REASON_BYTES {
			let mut cut = MAX_REASON_BYTES;
			while !reason.is_char_boundary(cut) {
				cut -= 1;
			}
			reason.truncate(cut);
		}
		Self { code, reason }
	}

	pub fn going_away(reason: impl Into<String>) -> Self {
		Self::new(GOING_AWAY, reason)
	}

	pub fn internal_error(reason: impl Into<String>) -> Self {
		Self::new(INTERNAL_ERROR, reason)
	}

	/// Returns true for codes that indicate a failure rather than a clean close.
	pub fn is_error(&self) -> bool {
		!matches!(self.code, NORMAL | GOING_AWAY)
	}
}

impl fmt::Display for CloseReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.reason.is_empty() {
			write!(f, "{}", self.code)
		} else {
			write!(f, "{} ({})", self.code, self.reason)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn short_reason_is_kept() {
		let close = CloseReason::new(1000, "done");
		assert_eq!(close.code, 1000);
		assert_eq!(close.reason, "done");
	}

	#[test]
	fn long_reason_is_truncated_on_char_boundary() {
		// 'é' is two bytes, so 62 of them straddle the limit
		let reason = "é".repeat(62);
		let close = CloseReason::new(INTERNAL_ERROR, reason);
		assert!(close.reason.len() <= MAX_REASON_BYTES);
		assert_eq!(close.reason.len(), 122);
		assert!(close.reason.chars().all(|c| c == 'é'));
	}

	#[test]
	fn error_classification() {
		assert!(!CloseReason::new(NORMAL, "bye").is_error());
		assert!(!CloseReason::going_away("shutdown").is_error());
		assert!(CloseReason::internal_error("boom").is_error());
	}

	#[test]
	fn display_includes_reason_when_present() {
		assert_eq!(CloseReason::new(NORMAL, "done").to_string(), "1000 (done)");
		assert_eq!(CloseReason::new(NORMAL, "").to_string(), "1000");
	}
}
