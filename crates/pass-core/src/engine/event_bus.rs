//! Event bus for mint progress.
//!
//! Wraps a tokio broadcast channel so any number of observers (the CLI, a UI,
//! tests) can follow an attempt without sharing state with it.

use pass_types::MintEvent;
use tokio::sync::broadcast;

/// Event bus broadcasting [`MintEvent`]s to every subscriber.
#[derive(Debug, Clone)]
pub struct EventBus {
	sender: broadcast::Sender<MintEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per slow subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<MintEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns an error if there are no active subscribers.
	pub fn publish(&self, event: MintEvent) -> Result<(), broadcast::error::SendError<MintEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}
