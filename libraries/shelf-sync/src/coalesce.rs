use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::hash::Hash;

/// Latest-value-wins gate for writes that fire continuously, like reading positions.
///
/// Per key, at most one request is in flight. Values arriving meanwhile replace each other, and
/// only the newest is sent once the in-flight request settles:
/// `Idle -> Sending -> (Idle | Sending with a queued value)`.
pub(crate) struct Coalescer<K, V> {
    slots: RefCell<HashMap<K, Slot<V>>>,
    next_lease: Cell<u64>,
}

struct Slot<V> {
    lease: u64,
    queued: Option<V>,
}

impl<K, V> Coalescer<K, V>
where
    K: Clone + Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self {
            slots: RefCell::new(HashMap::new()),
            next_lease: Cell::new(0),
        }
    }

    /// Returns a lease on `key` and the value back if the caller should send it now, or `None`
    /// if the value was queued behind the request already in flight for `key`.
    ///
    /// The lease holder drives the sends for `key`. Dropping the lease returns `key` to idle.
    pub(crate) fn admit(&self, key: K, value: V) -> Option<(Lease<'_, K, V>, V)> {
        let mut slots = self.slots.borrow_mut();
        if let Some(slot) = slots.get_mut(&key) {
            slot.queued = Some(value);
            return None;
        }

        let id = self.next_lease.get();
        self.next_lease.set(id + 1);
        slots.insert(
            key.clone(),
            Slot {
                lease: id,
                queued: None,
            },
        );
        Some((
            Lease {
                coalescer: self,
                key,
                id,
            },
            value,
        ))
    }

    #[cfg(test)]
    pub(crate) fn is_busy(&self, key: &K) -> bool {
        self.slots.borrow().contains_key(key)
    }

    /// Forget every queued value. Outstanding leases no longer own anything.
    pub(crate) fn clear(&self) {
        self.slots.borrow_mut().clear();
    }
}

pub(crate) struct Lease<'a, K, V>
where
    K: Eq + Hash,
{
    coalescer: &'a Coalescer<K, V>,
    key: K,
    id: u64,
}

impl<K, V> Lease<'_, K, V>
where
    K: Eq + Hash,
{
    /// The request settled. Returns the value to send next, if one was queued; otherwise the key
    /// goes back to idle.
    pub(crate) fn settle(&self) -> Option<V> {
        let mut slots = self.coalescer.slots.borrow_mut();
        let slot = slots.get_mut(&self.key)?;
        if slot.lease != self.id {
            return None;
        }
        match slot.queued.take() {
            Some(next) => Some(next),
            None => {
                slots.remove(&self.key);
                None
            }
        }
    }
}

impl<K, V> Drop for Lease<'_, K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        let mut slots = self.coalescer.slots.borrow_mut();
        // the slot may have been cleared and handed to someone else since
        if slots.get(&self.key).is_some_and(|slot| slot.lease == self.id) {
            slots.remove(&self.key);
        }
    }
}
