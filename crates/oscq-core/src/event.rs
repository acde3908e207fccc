//! Multi-subscriber async notification.
//!
//! [`BroadcastEvent`] keeps an ordered, copy-on-write list of async callbacks.
//! `invoke` snapshots the list and awaits every callback in subscription
//! order, one at a time. Subscribers may be added or removed from any thread,
//! including from inside a running callback; the change takes effect on the
//! next `invoke`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::error::HandlerError;

/// A boxed future, used for object-safe async callbacks and traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type Handler<T> = Arc<dyn Fn(T) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Handle returned by [`BroadcastEvent::add`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber<T> {
    id: SubscriptionId,
    handler: Handler<T>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: self.handler.clone(),
        }
    }
}

struct Inner<T> {
    subscribers: ArcSwap<Vec<Subscriber<T>>>,
    next_id: AtomicU64,
}

/// An ordered set of async subscribers.
///
/// Cloning is cheap and yields a handle to the same subscriber list.
pub struct BroadcastEvent<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for BroadcastEvent<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for BroadcastEvent<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: ArcSwap::from_pointee(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }
}

impl<T> fmt::Debug for BroadcastEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastEvent")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<T> BroadcastEvent<T> {
    /// Creates an event with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load().len()
    }

    /// Returns true if at least one subscriber is registered.
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() != 0
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        self.inner.subscribers.rcu(|current| {
            removed = current.iter().any(|s| s.id == id);
            current
                .iter()
                .filter(|s| s.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        removed
    }

    /// Removes every subscriber.
    pub fn clear(&self) {
        self.inner.subscribers.store(Arc::new(Vec::new()));
    }
}

impl<T: Clone + Send + 'static> BroadcastEvent<T> {
    /// Appends a subscriber.
    pub fn add<F, Fut>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler<T> = Arc::new(move |args| Box::pin(handler(args)));

        self.inner.subscribers.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Subscriber {
                id,
                handler: handler.clone(),
            });
            next
        });
        id
    }

    /// Invokes every subscriber in subscription order.
    ///
    /// Each callback is awaited before the next one starts. The first error
    /// stops the invocation and is returned to the caller.
    pub async fn invoke(&self, args: T) -> Result<(), HandlerError> {
        let snapshot = self.inner.subscribers.load_full();
        for subscriber in snapshot.iter() {
            (subscriber.handler)(args.clone()).await?;
        }
        Ok(())
    }
}
