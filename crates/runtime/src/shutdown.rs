//! Host shutdown signalling.
//!
//! One [`ShutdownTrigger`] per host; every session and in-flight launch holds a
//! cloned [`ShutdownSignal`] and races its pending read or spawn against it.

use tokio::sync::watch;

/// Creates a linked trigger/signal pair.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
	let (tx, rx) = watch::channel(false);
	(ShutdownTrigger(tx), ShutdownSignal(rx))
}

#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

impl ShutdownTrigger {
	/// Signals every linked [`ShutdownSignal`]. Idempotent.
	pub fn trigger(&self) {
		self.0.send_replace(true);
	}

	pub fn is_triggered(&self) -> bool {
		*self.0.borrow()
	}

	pub fn subscribe(&self) -> ShutdownSignal {
		ShutdownSignal(self.0.subscribe())
	}
}

#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
	/// A signal that never fires.
	pub fn never() -> Self {
		let (_tx, rx) = watch::channel(false);
		Self(rx)
	}

	pub fn is_triggered(&self) -> bool {
		*self.0.borrow()
	}

	/// Resolves once shutdown has been triggered.
	///
	/// A dropped trigger without a prior `trigger()` never resolves.
	pub async fn wait(&mut self) {
		let dropped = self.0.wait_for(|triggered| *triggered).await.is_err();
		if dropped {
			std::future::pending::<()>().await;
		}
	}
}
