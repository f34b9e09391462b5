//! Debounced, superseding location search.
//!
//! Each call to [`SearchDebouncer::begin`] hands out a [`SearchTicket`] and
//! cancels the previous one. A ticket may only publish while it is still
//! the newest; the check and the publication happen under the same lock
//! that supersedes tickets, so a late response can never overwrite a newer
//! query's results.

use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct SearchSlot {
    generation: u64,
    token: Option<CancellationToken>,
}

/// Permission for one search unit to run and publish.
#[derive(Debug, Clone)]
pub struct SearchTicket {
    generation: u64,
    token: CancellationToken,
}

impl SearchTicket {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once a newer search (or a reset) supersedes this one.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

#[derive(Debug)]
pub struct SearchDebouncer {
    debounce: Duration,
    min_query_len: usize,
    slot: Mutex<SearchSlot>,
}

impl SearchDebouncer {
    pub fn new(debounce: Duration, min_query_len: usize) -> Self {
        Self {
            debounce,
            min_query_len,
            slot: Mutex::new(SearchSlot::default()),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Whether `query` is long enough to reach the network.
    pub fn accepts(&self, query: &str) -> bool {
        query.chars().count() >= self.min_query_len
    }

    /// Supersede any running search and issue a ticket for a new one.
    pub fn begin(&self) -> SearchTicket {
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.token.take() {
            previous.cancel();
        }
        slot.generation = slot.generation.wrapping_add(1);
        let token = CancellationToken::new();
        slot.token = Some(token.clone());
        SearchTicket {
            generation: slot.generation,
            token,
        }
    }

    /// Cancel any running search without starting a new one.
    pub fn reset(&self) {
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.token.take() {
            previous.cancel();
        }
        slot.generation = slot.generation.wrapping_add(1);
    }

    /// Run `publish` only if `ticket` is still the newest search.
    ///
    /// Returns whether it ran.
    pub fn publish_if_current(&self, ticket: &SearchTicket, publish: impl FnOnce()) -> bool {
        let slot = self.slot.lock();
        if slot.generation != ticket.generation || ticket.is_cancelled() {
            return false;
        }
        publish();
        true
    }

    /// Sleep for the debounce interval. Returns `false` if superseded first.
    pub async fn wait(&self, ticket: &SearchTicket) -> bool {
        tokio::select! {
            _ = ticket.cancelled() => false,
            _ = tokio::time::sleep(self.debounce) => !ticket.is_cancelled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_counts_characters() {
        let debouncer = SearchDebouncer::new(Duration::from_millis(500), 2);
        assert!(!debouncer.accepts(""));
        assert!(!debouncer.accepts("L"));
        assert!(!debouncer.accepts("é"));
        assert!(debouncer.accepts("Lo"));
        assert!(debouncer.accepts("Åå"));
    }

    #[test]
    fn test_begin_cancels_previous_ticket() {
        let debouncer = SearchDebouncer::new(Duration::from_millis(500), 2);
        let first = debouncer.begin();
        let second = debouncer.begin();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!debouncer.publish_if_current(&first, || {}));
        assert!(debouncer.publish_if_current(&second, || {}));
    }

    #[test]
    fn test_reset_invalidates_ticket() {
        let debouncer = SearchDebouncer::new(Duration::from_millis(500), 2);
        let ticket = debouncer.begin();
        debouncer.reset();

        let mut published = false;
        assert!(!debouncer.publish_if_current(&ticket, || published = true));
        assert!(!published);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_completes_after_debounce() {
        let debouncer = SearchDebouncer::new(Duration::from_millis(500), 2);
        let ticket = debouncer.begin();
        let start = tokio::time::Instant::now();

        assert!(debouncer.wait(&ticket).await);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_early_when_superseded() {
        let debouncer = std::sync::Arc::new(SearchDebouncer::new(Duration::from_millis(500), 2));
        let ticket = debouncer.begin();

        let waiter = {
            let debouncer = debouncer.clone();
            let ticket = ticket.clone();
            tokio::spawn(async move { debouncer.wait(&ticket).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.begin();

        assert!(!waiter.await.unwrap());
    }
}
