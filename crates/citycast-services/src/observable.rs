//! Single-writer value holder with any number of read-only subscribers.
//!
//! A subscriber first sees the value current at subscription time, then every
//! value published afterwards, in publish order. The snapshot and the live feed
//! are taken under the same lock as publishing, so no change can slip between
//! them.

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Buffered changes per subscriber before the slowest one starts skipping.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct Observable<T> {
    current: Mutex<T>,
    tx: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        Self::with_capacity(initial, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(initial: T, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            current: Mutex::new(initial),
            tx,
        }
    }

    /// Latest published value.
    pub fn get(&self) -> T {
        self.current.lock().clone()
    }

    /// Publish a value to all subscribers.
    pub fn set(&self, value: T) {
        let mut current = self.current.lock();
        *current = value.clone();
        // No receivers is fine; late subscribers get the value from `current`.
        let _ = self.tx.send(value);
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let current = self.current.lock();
        Subscription {
            initial: Some(current.clone()),
            rx: self.tx.subscribe(),
        }
    }
}

impl<T: Clone + PartialEq + Send + 'static> Observable<T> {
    /// Publish only if `value` differs from the current one. Returns whether it was published.
    pub fn set_if_changed(&self, value: T) -> bool {
        let mut current = self.current.lock();
        if *current == value {
            return false;
        }
        *current = value.clone();
        let _ = self.tx.send(value);
        true
    }
}

/// Read side of an [`Observable`].
#[derive(Debug)]
pub struct Subscription<T> {
    initial: Option<T>,
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Next value, waiting for a change if needed. `None` once the observable is gone.
    pub async fn next(&mut self) -> Option<T> {
        if let Some(value) = self.initial.take() {
            return Some(value);
        }

        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscriber lagged, skipped {} values", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next value if one is already available.
    pub fn try_next(&mut self) -> Option<T> {
        if let Some(value) = self.initial.take() {
            return Some(value);
        }

        loop {
            match self.rx.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscriber lagged, skipped {} values", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the first value matching `predicate`, skipping the rest.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        while let Some(value) = self.next().await {
            if predicate(&value) {
                return Some(value);
            }
        }
        None
    }
}
