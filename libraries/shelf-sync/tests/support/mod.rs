#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use futures::channel::oneshot;
use shelf_sync::{
    CacheError, Delta, Item, ItemCache, ItemId, ItemPatch, LibraryApi, Library, MemoryCache,
    Mutation, MutationReceipt, Snapshot, SyncConfig, SyncToken, TransportError,
};

type MutationHandler = Box<dyn Fn(&Mutation) -> Result<MutationReceipt, TransportError>>;

/// Scripted server. Every call yields to the executor once before answering, so concurrent
/// callers really do overlap.
#[derive(Clone, Default)]
pub struct MockApi {
    script: Rc<RefCell<Script>>,
}

#[derive(Default)]
struct Script {
    snapshots: VecDeque<Result<Snapshot, TransportError>>,
    deltas: VecDeque<Result<Delta, TransportError>>,
    on_mutation: Option<MutationHandler>,
    fetch_all_gate: Option<oneshot::Receiver<()>>,
    fetch_delta_gate: Option<oneshot::Receiver<()>>,
    fetch_all_calls: usize,
    fetch_delta_calls: usize,
    mutations: Vec<Mutation>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_snapshot(&self, snapshot: Result<Snapshot, TransportError>) {
        self.script.borrow_mut().snapshots.push_back(snapshot);
    }

    pub fn push_delta(&self, delta: Result<Delta, TransportError>) {
        self.script.borrow_mut().deltas.push_back(delta);
    }

    pub fn on_mutation(
        &self,
        handler: impl Fn(&Mutation) -> Result<MutationReceipt, TransportError> + 'static,
    ) {
        self.script.borrow_mut().on_mutation = Some(Box::new(handler));
    }

    /// The next `fetch_all` waits until the returned sender fires (or is dropped).
    pub fn gate_fetch_all(&self) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.script.borrow_mut().fetch_all_gate = Some(receiver);
        sender
    }

    /// The next `fetch_delta` waits until the returned sender fires (or is dropped).
    pub fn gate_fetch_delta(&self) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.script.borrow_mut().fetch_delta_gate = Some(receiver);
        sender
    }

    pub fn fetch_all_calls(&self) -> usize {
        self.script.borrow().fetch_all_calls
    }

    pub fn fetch_delta_calls(&self) -> usize {
        self.script.borrow().fetch_delta_calls
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.script.borrow().mutations.clone()
    }
}

impl LibraryApi for MockApi {
    async fn fetch_all(&self) -> Result<Snapshot, TransportError> {
        let gate = {
            let mut script = self.script.borrow_mut();
            script.fetch_all_calls += 1;
            script.fetch_all_gate.take()
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        tokio::task::yield_now().await;
        self.script
            .borrow_mut()
            .snapshots
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("no snapshot scripted".to_string())))
    }

    async fn fetch_delta(&self, _since: &SyncToken) -> Result<Delta, TransportError> {
        let gate = {
            let mut script = self.script.borrow_mut();
            script.fetch_delta_calls += 1;
            script.fetch_delta_gate.take()
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        tokio::task::yield_now().await;
        self.script
            .borrow_mut()
            .deltas
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("no delta scripted".to_string())))
    }

    async fn send_mutation(&self, mutation: &Mutation) -> Result<MutationReceipt, TransportError> {
        self.script.borrow_mut().mutations.push(mutation.clone());
        tokio::task::yield_now().await;
        let script = self.script.borrow();
        match &script.on_mutation {
            Some(handler) => handler(mutation),
            None => Ok(MutationReceipt::default()),
        }
    }
}

/// [`MemoryCache`] whose reads can be made to fail.
#[derive(Clone, Default)]
pub struct FlakyCache {
    pub inner: MemoryCache,
    pub fail_reads: Rc<Cell<bool>>,
}

impl ItemCache for FlakyCache {
    async fn get_all(&self) -> Result<Vec<Item>, CacheError> {
        if self.fail_reads.get() {
            return Err(CacheError::Unavailable("disk on fire".to_string()));
        }
        self.inner.get_all().await
    }

    async fn put_all(&self, items: &[Item]) -> Result<(), CacheError> {
        self.inner.put_all(items).await
    }

    async fn delete_many(&self, ids: &[ItemId]) -> Result<(), CacheError> {
        self.inner.delete_many(ids).await
    }

    async fn sync_token(&self) -> Result<Option<SyncToken>, CacheError> {
        self.inner.sync_token().await
    }

    async fn set_sync_token(&self, token: &SyncToken) -> Result<(), CacheError> {
        self.inner.set_sync_token(token).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.inner.clear().await
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn item(id: ItemId) -> Item {
    let mut item = Item::new(id);
    item.metadata
        .insert("title".to_string(), format!("Book {id}").into());
    item
}

pub fn items(ids: &[ItemId]) -> Vec<Item> {
    ids.iter().copied().map(item).collect()
}

pub fn snapshot(ids: &[ItemId], token: &str) -> Snapshot {
    Snapshot {
        items: items(ids),
        sync_token: Some(SyncToken::new(token)),
    }
}

pub fn status_patch(id: ItemId, status: &str) -> ItemPatch {
    ItemPatch {
        read_status: Some(status.to_string()),
        ..ItemPatch::new(id)
    }
}

/// Item ids in the current state, sorted. Empty if nothing is loaded.
pub fn state_ids<A, C>(library: &Library<A, C>) -> Vec<ItemId>
where
    A: LibraryApi + 'static,
    C: ItemCache + 'static,
{
    let mut ids: Vec<ItemId> = library
        .state()
        .items
        .iter()
        .flatten()
        .map(|item| item.id)
        .collect();
    ids.sort();
    ids
}

pub async fn cached_ids(cache: &impl ItemCache) -> Vec<ItemId> {
    let mut ids: Vec<ItemId> = cache
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    ids.sort();
    ids
}

/// A library over `api` and a fresh in-memory cache, with default config.
pub fn library(api: &MockApi) -> (Library<MockApi, MemoryCache>, MemoryCache) {
    init_logging();
    let cache = MemoryCache::new();
    let library = Library::new(api.clone(), cache.clone(), SyncConfig::default());
    (library, cache)
}

/// A library that has already completed a full fetch of `ids` with token `T0`.
pub async fn loaded_library(
    ids: &[ItemId],
) -> (Library<MockApi, MemoryCache>, MockApi, MemoryCache) {
    let api = MockApi::new();
    api.push_snapshot(Ok(snapshot(ids, "T0")));
    let (library, cache) = library(&api);
    library.ensure_loaded().await;
    (library, api, cache)
}
