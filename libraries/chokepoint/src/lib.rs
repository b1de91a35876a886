//! Single-flight for async work on a single thread.
//!
//! Callers asking for the same key while a computation for that key is still running attach to
//! the running computation instead of starting another one. Once it settles the key is free again,
//! so the next call starts fresh work.

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

pub type InFlight<V> = Shared<LocalBoxFuture<'static, V>>;

pub struct ChokePoint<K, V> {
    in_flight: Rc<RefCell<HashMap<K, Entry<V>>>>,
    next_flight_id: Cell<u64>,
}

struct Entry<V> {
    flight_id: u64,
    future: InFlight<V>,
}

impl<K, V> ChokePoint<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Rc::new(RefCell::new(HashMap::new())),
            next_flight_id: Cell::new(0),
        }
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.in_flight.borrow().contains_key(key)
    }

    /// Handle to the computation currently running for `key`, if any.
    pub fn in_flight(&self, key: &K) -> Option<InFlight<V>> {
        self.in_flight
            .borrow()
            .get(key)
            .map(|entry| entry.future.clone())
    }

    /// Run `compute` for `key`, or join the computation already running for it.
    ///
    /// `compute` is only called when nothing is in flight for `key`.
    pub async fn run<F, Fut>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + 'static,
    {
        if let Some(existing) = self.in_flight(&key) {
            return existing.await;
        }

        let flight_id = self.next_flight_id.get();
        self.next_flight_id.set(flight_id + 1);

        let in_flight = Rc::clone(&self.in_flight);
        let key_clone = key.clone();
        let work = compute();
        let wrapped = async move {
            let value = work.await;
            // only clear our own entry; the key may have been abandoned and reused meanwhile
            let mut in_flight = in_flight.borrow_mut();
            if in_flight
                .get(&key_clone)
                .is_some_and(|entry| entry.flight_id == flight_id)
            {
                in_flight.remove(&key_clone);
            }
            value
        }
        .boxed_local()
        .shared();

        self.in_flight.borrow_mut().insert(
            key,
            Entry {
                flight_id,
                future: wrapped.clone(),
            },
        );

        wrapped.await
    }

    /// Forget the computation for `key`. Anyone already awaiting it still gets its result, but new
    /// callers start over.
    pub fn abandon(&self, key: &K) {
        self.in_flight.borrow_mut().remove(key);
    }
}

impl<K, V> Default for ChokePoint<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
