//! Broadcast channel carrying marketplace events.
//!
//! Components publish lifecycle events here and any number of subscribers
//! (the engine loop, CLI views, tests) receive their own copy.

use market_types::MarketEvent;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Cloneable handle to the shared event channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<MarketEvent>,
}

impl EventBus {
	/// Creates a bus that buffers up to `capacity` events per lagging subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to events published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
		self.sender.subscribe()
	}

	/// Subscribes and exposes the receiver as a `Stream`.
	pub fn stream(&self) -> BroadcastStream<MarketEvent> {
		BroadcastStream::new(self.subscribe())
	}

	/// Publishes an event to all current subscribers.
	///
	/// Fails only when nobody is subscribed; publishers usually ignore that.
	pub fn publish(
		&self,
		event: MarketEvent,
	) -> Result<(), broadcast::error::SendError<MarketEvent>> {
		self.sender.send(event).map(|_| ())
	}
}
