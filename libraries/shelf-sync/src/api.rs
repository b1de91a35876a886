use crate::data_model::{Delta, Mutation, MutationReceipt, Snapshot, SyncToken};
use crate::error::TransportError;

/// What the sync core needs from the server. Request plumbing and authentication belong to the
/// implementation.
#[allow(async_fn_in_trait)]
pub trait LibraryApi {
    /// The whole collection, with a token for the server instant the response was produced at.
    async fn fetch_all(&self) -> Result<Snapshot, TransportError>;

    async fn fetch_delta(&self, since: &SyncToken) -> Result<Delta, TransportError>;

    async fn send_mutation(&self, mutation: &Mutation) -> Result<MutationReceipt, TransportError>;
}
