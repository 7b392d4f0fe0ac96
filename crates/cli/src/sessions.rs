//! Live-session bookkeeping.
//!
//! Every upgraded connection is tracked from the moment its handshake starts
//! until its session ends, including the time spent waiting for a launched
//! debuggee. Shutdown uses the table to wait for sessions to drain.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bridge_runtime::SessionId;
use dashmap::DashMap;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
	Launching,
	Connecting,
	Relaying,
}

#[derive(Debug, Clone)]
pub struct SessionInfo {
	/// Page id or launched program.
	pub target: String,
	pub phase: SessionPhase,
	pub started: Instant,
}

#[derive(Debug)]
pub struct SessionTable {
	entries: DashMap<SessionId, SessionInfo>,
	live: watch::Sender<usize>,
}

impl Default for SessionTable {
	fn default() -> Self {
		Self {
			entries: DashMap::new(),
			live: watch::channel(0).0,
		}
	}
}

impl SessionTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Tracks a new session until the returned guard is dropped.
	pub fn track(self: &Arc<Self>, id: SessionId, target: impl Into<String>, phase: SessionPhase) -> SessionGuard {
		let info = SessionInfo {
			target: target.into(),
			phase,
			started: Instant::now(),
		};
		if self.entries.insert(id, info).is_none() {
			self.live.send_modify(|n| *n += 1);
		}
		SessionGuard {
			table: Arc::clone(self),
			id,
		}
	}

	/// Live sessions ordered by id.
	pub fn snapshot(&self) -> Vec<(SessionId, SessionInfo)> {
		let mut live: Vec<_> = self
			.entries
			.iter()
			.map(|entry| (*entry.key(), entry.value().clone()))
			.collect();
		live.sort_by_key(|(id, _)| *id);
		live
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Waits until no sessions remain. Returns false if `timeout` elapsed first.
	pub async fn drained(&self, timeout: Duration) -> bool {
		let mut live = self.live.subscribe();
		tokio::time::timeout(timeout, live.wait_for(|n| *n == 0))
			.await
			.is_ok_and(|res| res.is_ok())
	}

	fn set_phase(&self, id: SessionId, phase: SessionPhase) {
		if let Some(mut entry) = self.entries.get_mut(&id) {
			entry.phase = phase;
		}
	}

	fn remove(&self, id: SessionId) {
		if self.entries.remove(&id).is_some() {
			self.live.send_modify(|n| *n -= 1);
		}
	}
}

/// Removes its session from the table when dropped.
#[derive(Debug)]
pub struct SessionGuard {
	table: Arc<SessionTable>,
	id: SessionId,
}

impl SessionGuard {
	pub fn id(&self) -> SessionId {
		self.id
	}

	pub fn set_phase(&self, phase: SessionPhase) {
		self.table.set_phase(self.id, phase);
	}
}

impl Drop for SessionGuard {
	fn drop(&mut self) {
		self.table.remove(self.id);
	}
}
