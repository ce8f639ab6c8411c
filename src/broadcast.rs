use crate::frame::Frame;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Fans frames out to every connected client.
///
/// Each subscriber owns a single-slot mailbox: a frame published before the
/// previous one was read replaces it, so slow clients skip frames instead of
/// queueing them and never hold up `publish`.
#[derive(Default)]
pub struct Broadcaster {
    subscribers: Mutex<HashMap<SubscriberId, watch::Sender<Option<Frame>>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// Receiving end of one subscription.
pub struct Subscriber {
    id: SubscriberId,
    slot: watch::Receiver<Option<Frame>>,
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next frame. Returns `None` once the subscription has been
    /// closed by `unsubscribe` or `shutdown`.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            self.slot.changed().await.ok()?;
            if let Some(frame) = self.slot.borrow_and_update().clone() {
                return Some(frame);
            }
        }
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscriber {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, slot) = watch::channel(None);
        let mut subscribers = self.subscribers.lock();
        // After shutdown the sender is dropped here, so `recv` ends immediately.
        if !self.closed.load(Ordering::Acquire) {
            subscribers.insert(id, tx);
            tracing::debug!(subscriber = id.0, "subscriber registered");
        }
        Subscriber { id, slot }
    }

    /// Offers `frame` to every subscriber without waiting on any of them.
    /// Returns how many subscribers were offered the frame.
    pub fn publish(&self, frame: &Frame) -> usize {
        let subscribers = self.subscribers.lock();
        subscribers
            .values()
            .filter(|tx| tx.send(Some(frame.clone())).is_ok())
            .count()
    }

    /// Closes the subscriber's slot. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = id.0, "subscriber removed");
        }
        removed
    }

    /// Closes every subscription at once. Later subscriptions start closed.
    pub fn shutdown(&self) {
        let mut subscribers = self.subscribers.lock();
        self.closed.store(true, Ordering::Release);
        let closed = std::mem::take(&mut *subscribers);
        tracing::info!(subscribers = closed.len(), "closing all subscribers");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
