//! Registry of attachable targets.
//!
//! Seeded from configuration at startup and updated while launched debuggees
//! are live. Reads come from concurrent handshakes and discovery queries, so
//! entries sit behind a read-write lock; listing is ordered by id, which keeps
//! discovery output stable for an unchanged registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use bridge_protocol::TargetDescriptor;
use parking_lot::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
pub struct TargetRegistry {
	targets: RwLock<BTreeMap<String, TargetDescriptor>>,
}

impl TargetRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_targets(targets: impl IntoIterator<Item = TargetDescriptor>) -> Self {
		let registry = Self::new();
		for target in targets {
			registry.insert(target);
		}
		registry
	}

	/// Adds or replaces a target, returning the previous entry for the id.
	pub fn insert(&self, target: TargetDescriptor) -> Option<TargetDescriptor> {
		debug!(target = "dbgbridge.discovery", target_id = %target.id, backend = %target.backend, "target registered");
		self.targets.write().insert(target.id.clone(), target)
	}

	pub fn remove(&self, id: &str) -> Option<TargetDescriptor> {
		let removed = self.targets.write().remove(id);
		if removed.is_some() {
			debug!(target = "dbgbridge.discovery", target_id = %id, "target removed");
		}
		removed
	}

	/// Backend address registered for `id`.
	pub fn backend_for(&self, id: &str) -> Option<String> {
		self.targets.read().get(id).map(|t| t.backend.clone())
	}

	/// Snapshot of all targets, ordered by id.
	pub fn list(&self) -> Vec<TargetDescriptor> {
		self.targets.read().values().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.targets.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.targets.read().is_empty()
	}

	/// Registers `target` until the returned guard is dropped.
	pub fn register(self: &Arc<Self>, target: TargetDescriptor) -> Registration {
		let id = target.id.clone();
		self.insert(target);
		Registration {
			registry: Arc::clone(self),
			id,
		}
	}
}

/// Keeps a target listed for as long as it is held.
#[derive(Debug)]
pub struct Registration {
	registry: Arc<TargetRegistry>,
	id: String,
}

impl Drop for Registration {
	fn drop(&mut self) {
		self.registry.remove(&self.id);
	}
}
