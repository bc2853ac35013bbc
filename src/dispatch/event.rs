//! Typed event sources.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;

/// Callback registered on an [`EventSource`].
///
/// Identity is the `Arc` allocation: keep a clone to remove it later.
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// An event that any number of callbacks can subscribe to.
pub struct EventSource<T> {
    callbacks: Mutex<Vec<Callback<T>>>,
}

impl<T> EventSource<T> {
    /// Create an event source with no subscribers.
    pub fn new() -> Self {
        Self {
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe `callback`. Adding the same callback twice has no effect.
    pub fn add_callback(&self, callback: Callback<T>) {
        let mut callbacks = self.callbacks.lock();
        if !callbacks.iter().any(|c| Arc::ptr_eq(c, &callback)) {
            callbacks.push(callback);
        }
    }

    /// Unsubscribe `callback`. Removing an unknown callback is a no-op.
    pub fn remove_callback(&self, callback: &Callback<T>) {
        self.callbacks.lock().retain(|c| !Arc::ptr_eq(c, callback));
    }

    /// Invoke every subscriber with `args`, in subscription order.
    pub fn call(&self, args: &T) {
        let snapshot: Vec<Callback<T>> = self.callbacks.lock().clone();
        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(args))).is_err() {
                tracing::error!("event callback panicked");
            }
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Whether nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.callbacks.lock().is_empty()
    }
}

impl<T> Default for EventSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("callbacks", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Callback<u32>) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let callback: Callback<u32> = Arc::new(move |v: &u32| {
            inner.fetch_add(*v as usize, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn test_call_reaches_all_subscribers() {
        let source = EventSource::new();
        let (a, cb_a) = counter();
        let (b, cb_b) = counter();
        source.add_callback(cb_a);
        source.add_callback(cb_b);

        source.call(&3);

        assert_eq!(a.load(Ordering::SeqCst), 3);
        assert_eq!(b.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_add_and_remove_are_idempotent() {
        let source = EventSource::new();
        let (count, callback) = counter();

        source.add_callback(Arc::clone(&callback));
        source.add_callback(Arc::clone(&callback));
        assert_eq!(source.len(), 1);

        source.call(&1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        source.remove_callback(&callback);
        source.remove_callback(&callback);
        assert!(source.is_empty());

        source.call(&1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_callback_is_isolated() {
        let source = EventSource::new();
        source.add_callback(Arc::new(|_: &u32| panic!("boom")));
        let (count, callback) = counter();
        source.add_callback(callback);

        source.call(&2);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let source = Arc::new(EventSource::<u32>::new());
        let slot: Arc<Mutex<Option<Callback<u32>>>> = Arc::new(Mutex::new(None));

        let weak_source = Arc::downgrade(&source);
        let weak_slot = Arc::downgrade(&slot);
        let callback: Callback<u32> = Arc::new(move |_| {
            if let (Some(source), Some(slot)) = (weak_source.upgrade(), weak_slot.upgrade()) {
                if let Some(me) = slot.lock().as_ref() {
                    source.remove_callback(me);
                }
            }
        });
        *slot.lock() = Some(Arc::clone(&callback));
        source.add_callback(callback);

        source.call(&0);
        assert!(source.is_empty());
    }
}
