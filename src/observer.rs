//! Small publish-subscribe cells for UI observers
//!
//! Connection state, dimensions and similar low-rate signals are
//! published through [`Observable`]: a latest-value cell plus bounded
//! subscriber channels. No framework reactive primitives cross the core
//! boundary; subscribers get plain `crossbeam_channel` receivers.

use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender};

/// Per-subscriber channel depth. Observers that fall behind lose
/// intermediate updates but can always read the latest value.
const SUBSCRIBER_DEPTH: usize = 64;

/// Latest-value cell with fan-out to subscribers
pub struct Observable<T: Clone + Send> {
    latest: Mutex<Option<T>>,
    subscribers: Mutex<Vec<Sender<T>>>,
}

impl<T: Clone + Send> Observable<T> {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Publish a new value: replaces the latest and fans out to every
    /// live subscriber. Disconnected subscribers are pruned here.
    pub fn publish(&self, value: T) {
        *self.latest.lock().unwrap() = Some(value.clone());

        let mut subs = self.subscribers.lock().unwrap();
        subs.retain(|tx| match tx.try_send(value.clone()) {
            Ok(()) => true,
            Err(crossbeam_channel::TrySendError::Full(_)) => true,
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
        });
    }

    /// Latest published value, if any
    pub fn get(&self) -> Option<T> {
        self.latest.lock().unwrap().clone()
    }

    /// Attach a new subscriber channel
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = bounded(SUBSCRIBER_DEPTH);
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Number of live subscribers (for diagnostics)
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

impl<T: Clone + Send> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}
