use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::models::SearchHit;
use crate::tmdb::{KindFilter, TmdbApi};
use crate::trending::TrendingStore;

/// Delay a query must sit unchanged before it is dispatched.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Cancellable delayed-task gate. Every keystroke issues a fresh ticket,
/// which invalidates all earlier ones; only the ticket that is still
/// current after its delay (and again after its network call) may deliver
/// results. The second check closes the race where a slow early request
/// completes after a fast later one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Supersede all outstanding tickets and return a new one.
    pub fn issue(&self) -> Ticket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            generation,
            counter: Arc::clone(&self.generation),
            delay: self.delay,
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

#[derive(Debug)]
pub struct Ticket {
    generation: u64,
    counter: Arc<AtomicU64>,
    delay: Duration,
}

impl Ticket {
    /// Wait out the debounce delay. Returns false if another ticket was
    /// issued meanwhile (the timer-phase cancellation).
    pub async fn settle(&self) -> bool {
        tokio::time::sleep(self.delay).await;
        self.is_current()
    }

    /// Re-check after the network phase before delivering results.
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.generation
    }
}

/// Debounced search over the media directory, recording a trending counter
/// hit for each settled query.
pub struct SearchFlow {
    client: Arc<dyn TmdbApi>,
    trending: Arc<TrendingStore>,
    debouncer: Debouncer,
}

impl SearchFlow {
    pub fn new(client: Arc<dyn TmdbApi>, trending: Arc<TrendingStore>) -> Self {
        Self {
            client,
            trending,
            debouncer: Debouncer::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.debouncer = Debouncer::new(delay);
        self
    }

    /// Submit one keystroke's worth of query. `Ok(None)` means a newer
    /// keystroke superseded this one and nothing should change on screen.
    /// A blank query settles to an empty result set. Search failures for a
    /// still-current ticket propagate for user-visible display.
    pub async fn submit(&self, query: &str) -> Result<Option<Vec<SearchHit>>> {
        let ticket = self.debouncer.issue();
        if !ticket.settle().await {
            return Ok(None);
        }
        if query.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        let result = self
            .client
            .search_or_trending(query, 1, KindFilter::All)
            .await;
        if !ticket.is_current() {
            return Ok(None);
        }
        let page = result?;
        let hits: Vec<SearchHit> = page.results.into_iter().map(SearchHit::Media).collect();
        // One counter bump per settled query, keyed off the top result.
        self.trending.record_search_hit(query, hits.first()).await;
        Ok(Some(hits))
    }

    /// Person-scoped variant. Person results never record trending hits.
    pub async fn submit_persons(&self, query: &str) -> Result<Option<Vec<SearchHit>>> {
        let ticket = self.debouncer.issue();
        if !ticket.settle().await {
            return Ok(None);
        }
        if query.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        let result = self.client.search_persons(query, 1).await;
        if !ticket.is_current() {
            return Ok(None);
        }
        let page = result?;
        Ok(Some(
            page.results.into_iter().map(SearchHit::Person).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn newer_ticket_cancels_older_timer() {
        let debouncer = Debouncer::new(Duration::from_millis(5));
        let first = debouncer.issue();
        let second = debouncer.issue();
        assert!(!first.settle().await);
        assert!(second.settle().await);
    }

    #[tokio::test]
    async fn ticket_goes_stale_after_network_phase_too() {
        let debouncer = Debouncer::new(Duration::from_millis(1));
        let first = debouncer.issue();
        assert!(first.settle().await);
        // A keystroke arriving while the request is in flight.
        let _second = debouncer.issue();
        assert!(!first.is_current());
    }
}
