//! The in-memory collection the UI watches.
//!
//! Dumb on purpose: it holds the current snapshot and tells listeners when it is replaced.
//! Writers build a whole new [`CollectionState`] and hand it to [`StateContainer::replace`]; nobody
//! edits a published snapshot, so a listener can compare snapshots with `Rc::ptr_eq`.

use std::cell::RefCell;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use slotmap::SlotMap;

use crate::data_model::CollectionState;

slotmap::new_key_type! {
    pub struct ListenerKey;
}

type Listener = Rc<dyn Fn(&Rc<CollectionState>)>;

struct Shared {
    current: RefCell<Rc<CollectionState>>,
    listeners: RefCell<SlotMap<ListenerKey, Listener>>,
}

pub struct StateContainer {
    shared: Rc<Shared>,
}

impl StateContainer {
    pub fn new() -> Self {
        Self {
            shared: Rc::new(Shared {
                current: RefCell::new(Rc::new(CollectionState::default())),
                listeners: RefCell::new(SlotMap::with_key()),
            }),
        }
    }

    pub fn current(&self) -> Rc<CollectionState> {
        Rc::clone(&self.shared.current.borrow())
    }

    /// Publish `next` and call every listener with it before returning.
    pub fn replace(&self, next: CollectionState) -> Rc<CollectionState> {
        let next = Rc::new(next);
        *self.shared.current.borrow_mut() = Rc::clone(&next);

        // copy the listeners out first: a callback may well subscribe, unsubscribe or replace again
        let listeners: Vec<Listener> = self.shared.listeners.borrow().values().cloned().collect();
        for listener in listeners {
            listener(&next);
        }
        next
    }

    /// Register `listener`. It is called once right away with the current snapshot, then on every
    /// replacement.
    pub fn subscribe(&self, listener: impl Fn(&Rc<CollectionState>) + 'static) -> ListenerKey {
        let listener: Listener = Rc::new(listener);
        let key = self
            .shared
            .listeners
            .borrow_mut()
            .insert(Rc::clone(&listener));
        listener(&self.current());
        key
    }

    pub fn unsubscribe(&self, key: ListenerKey) {
        self.shared.listeners.borrow_mut().remove(key);
    }

    /// Snapshots as a stream, starting with the current one. Dropping the stream unsubscribes.
    pub fn stream(&self) -> StateStream {
        let (sender, receiver) = mpsc::unbounded();
        let key = self.subscribe(move |state| {
            // the receiver may already be gone; its Drop unsubscribes us
            let _ = sender.unbounded_send(Rc::clone(state));
        });
        StateStream {
            receiver,
            key,
            shared: Rc::downgrade(&self.shared),
        }
    }
}

impl Default for StateContainer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StateStream {
    receiver: mpsc::UnboundedReceiver<Rc<CollectionState>>,
    key: ListenerKey,
    shared: Weak<Shared>,
}

impl Stream for StateStream {
    type Item = Rc<CollectionState>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_next_unpin(cx)
    }
}

impl Drop for StateStream {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.listeners.borrow_mut().remove(self.key);
        }
    }
}
