use futures::{Stream, StreamExt};

use crate::api::LibraryApi;
use crate::cache::ItemCache;
use crate::data_model::CollectionState;
use crate::sync::Library;

impl<A, C> Library<A, C>
where
    A: LibraryApi + 'static,
    C: ItemCache + 'static,
{
    /// End the current session: empty the collection, forget the load in flight (its result will
    /// be dropped when it arrives), drop queued progress saves and clear the cache.
    pub async fn reset(&self) {
        let abandoned = self.generation();
        self.inner.generation.set(abandoned + 1);
        self.inner.flight.abandon(&abandoned);
        self.inner.progress.clear();
        self.inner.state.replace(CollectionState::default());

        log::info!("Session reset, clearing the local cache");
        if let Err(e) = self.inner.cache.clear().await {
            log::warn!("Failed to clear the cache on session reset: {e}");
        }
    }

    /// Follow the credential token and reset whenever it goes away or changes.
    pub async fn watch_credentials<S>(&self, credentials: S)
    where
        S: Stream<Item = Option<String>>,
    {
        let mut credentials = std::pin::pin!(credentials);
        let mut previous: Option<Option<String>> = None;
        while let Some(next) = credentials.next().await {
            let previous_token = previous.as_ref().map(Option::as_deref);
            if session_ended(previous_token, next.as_deref()) {
                self.reset().await;
            }
            previous = Some(next);
        }
    }
}

/// `previous` is `None` before the first credential arrives.
fn session_ended(previous: Option<Option<&str>>, next: Option<&str>) -> bool {
    match (previous, next) {
        // starting logged out: drop whatever an earlier session left in the cache
        (None, None) => true,
        (None, Some(_)) => false,
        (Some(Some(_)), None) => true,
        (Some(None), None) => false,
        (Some(None), Some(_)) => false,
        (Some(Some(previous)), Some(next)) => previous != next,
    }
}

#[cfg(test)]
mod tests {
    use super::session_ended;

    #[test]
    fn logout_and_user_switch_end_the_session() {
        assert!(session_ended(Some(Some("alice")), None));
        assert!(session_ended(Some(Some("alice")), Some("bob")));
        assert!(!session_ended(Some(Some("alice")), Some("alice")));
    }

    #[test]
    fn login_does_not_reset() {
        assert!(!session_ended(None, Some("alice")));
        assert!(!session_ended(Some(None), Some("alice")));
    }

    #[test]
    fn repeated_logged_out_resets_once() {
        assert!(session_ended(None, None));
        assert!(!session_ended(Some(None), None));
    }
}
