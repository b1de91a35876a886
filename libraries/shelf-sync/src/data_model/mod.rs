//! The types that flow between the cache, the state container and the server.
//! Files are numbered bottom-up: each one only builds on the ones before it.

#[path = "1-item.rs"]
mod item;
pub use item::*;

#[path = "2-collection-state.rs"]
mod collection_state;
pub use collection_state::*;

#[path = "3-delta.rs"]
mod delta;
pub use delta::*;

#[path = "4-push-event.rs"]
mod push_event;
pub use push_event::*;

#[path = "5-mutation.rs"]
mod mutation;
pub use mutation::*;
