//! Publish/subscribe bridge between the sampling engine and its consumers.
//!
//! Every subscriber owns a small bounded queue. `publish` never waits: a
//! reading is offered to each queue with `try_send` and dropped for any
//! subscriber that is not keeping up. There is no replay, so a reading
//! published while nobody is subscribed is simply lost.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::speed::SpeedReading;

pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SubscriptionHandle(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub subscribers: usize,
}

#[derive(Debug)]
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub readings: mpsc::Receiver<SpeedReading>,
}

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    subscribers: BTreeMap<SubscriptionHandle, mpsc::Sender<SpeedReading>>,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct SpeedBus {
    registry: Arc<Mutex<Registry>>,
    counters: Arc<Counters>,
    buffer: usize,
}

impl Default for SpeedBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl SpeedBus {
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            counters: Arc::new(Counters::default()),
            buffer: buffer.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut registry = self.lock();
        registry.next_id += 1;
        let handle = SubscriptionHandle(registry.next_id);
        registry.subscribers.insert(handle, tx);
        log::debug!("Subscriber {:?} registered", handle);
        Subscription {
            handle,
            readings: rx,
        }
    }

    /// Runs `handler` for every reading delivered to a new subscription.
    ///
    /// The handler runs on its own task, so a slow handler only ever loses
    /// its own readings. Must be called from within a tokio runtime.
    pub fn subscribe_with<F>(&self, mut handler: F) -> (SubscriptionHandle, JoinHandle<()>)
    where
        F: FnMut(SpeedReading) + Send + 'static,
    {
        let Subscription {
            handle,
            mut readings,
        } = self.subscribe();
        let join = tokio::spawn(async move {
            while let Some(reading) = readings.recv().await {
                handler(reading);
            }
        });
        (handle, join)
    }

    /// Returns whether the handle was still registered.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = self.lock().subscribers.remove(&handle).is_some();
        if removed {
            log::debug!("Subscriber {:?} removed", handle);
        }
        removed
    }

    /// Offers `reading` to every subscriber and returns how many took it.
    pub fn publish(&self, reading: SpeedReading) -> usize {
        self.counters.published.fetch_add(1, Ordering::Relaxed);

        let mut registry = self.lock();
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (handle, tx) in registry.subscribers.iter() {
            match tx.try_send(reading) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!("Subscriber {:?} is lagging, reading dropped", handle);
                }
                Err(TrySendError::Closed(_)) => closed.push(*handle),
            }
        }

        for handle in closed {
            registry.subscribers.remove(&handle);
            log::debug!("Subscriber {:?} went away, pruned", handle);
        }

        if registry.subscribers.is_empty() && delivered == 0 {
            log::debug!("No subscribers, reading dropped");
        }

        self.counters
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
        }
    }
}
