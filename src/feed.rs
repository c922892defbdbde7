use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error};

use crate::models::MediaItem;
use crate::tmdb::{CategoryList, KindFilter, MovieList, TmdbApi, TvList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    All,
    Movie,
    Tv,
}

/// Active category plus the curated sub-list for each kind-specific
/// category. The sub-lists are remembered even while `All` is active so a
/// category switch restores the previous selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedFilter {
    pub category: Category,
    pub movie_list: MovieList,
    pub tv_list: TvList,
}

impl Default for FeedFilter {
    fn default() -> Self {
        Self {
            category: Category::All,
            movie_list: MovieList::Popular,
            tv_list: TvList::Popular,
        }
    }
}

impl FeedFilter {
    fn category_list(&self) -> Option<CategoryList> {
        match self.category {
            Category::All => None,
            Category::Movie => Some(CategoryList::Movie(self.movie_list)),
            Category::Tv => Some(CategoryList::Tv(self.tv_list)),
        }
    }
}

/// Mutable controller state for one list screen. Items are append-only
/// within a session and replaced wholesale on reset.
#[derive(Debug, Clone)]
pub struct ListSession {
    pub items: Vec<MediaItem>,
    pub page: u32,
    pub has_more: bool,
    pub is_loading_more: bool,
    pub filter: FeedFilter,
    /// Monotonic epoch counter. Every reset advances it; in-flight loads
    /// carry the generation they were launched under and are discarded if
    /// it has since moved on.
    pub generation: u64,
}

impl ListSession {
    fn new(filter: FeedFilter) -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            has_more: true,
            is_loading_more: false,
            filter,
            generation: 0,
        }
    }
}

/// Tag for one in-flight load-more, capturing the session epoch and the
/// page/filter it was launched under.
#[derive(Debug)]
pub struct LoadTicket {
    generation: u64,
    page: u32,
    filter: FeedFilter,
}

/// What happened when an in-flight load's result was applied back.
#[derive(Debug, PartialEq, Eq)]
pub enum Applied {
    /// Batch appended; carries the number of items added. `Appended(0)`
    /// means the feed just exhausted.
    Appended(usize),
    /// No load was started: one was already in flight or the feed is
    /// exhausted. No request reached the client.
    Skipped,
    /// A reset advanced the session while this load was in flight; the
    /// result was discarded.
    Stale,
    /// The fetch failed; session state is untouched and the load can be
    /// retried.
    Failed,
}

pub struct FeedController {
    client: Arc<dyn TmdbApi>,
    session: ListSession,
}

impl FeedController {
    pub fn new(client: Arc<dyn TmdbApi>) -> Self {
        Self {
            client,
            session: ListSession::new(FeedFilter::default()),
        }
    }

    pub fn session(&self) -> &ListSession {
        &self.session
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.session.items
    }

    /// Rebuild the session under a new filter: fetch page 1, replace the
    /// item list wholesale, and advance the cursor. Triggered by category
    /// change, sub-list change, and pull-to-refresh alike, so stale pages
    /// from a previous filter can never mix into the new list.
    ///
    /// On failure the previous items, cursor, and `has_more` are left
    /// untouched and the error propagates for user-visible display.
    pub async fn reset(&mut self, filter: FeedFilter) -> Result<()> {
        self.session.generation += 1;
        self.session.filter = filter;
        match fetch_page_for(self.client.as_ref(), filter, 1).await {
            Ok(batch) => {
                self.session.has_more = !batch.is_empty();
                self.session.items = batch;
                self.session.page = 2;
                debug!(
                    generation = self.session.generation,
                    items = self.session.items.len(),
                    "Feed reset"
                );
                Ok(())
            }
            Err(e) => {
                error!("Feed reset failed: {}", e);
                Err(e)
            }
        }
    }

    /// First phase of a load-more. Returns `None` while a load is already
    /// in flight or after an empty page exhausted the feed; otherwise
    /// raises the in-flight flag and hands back a generation-tagged ticket.
    pub fn begin_load_more(&mut self) -> Option<LoadTicket> {
        if self.session.is_loading_more || !self.session.has_more {
            return None;
        }
        self.session.is_loading_more = true;
        Some(LoadTicket {
            generation: self.session.generation,
            page: self.session.page,
            filter: self.session.filter,
        })
    }

    /// Second phase: the actual page fetch for a ticket. Borrows the
    /// controller immutably so a caller can interleave a reset while this
    /// is pending.
    pub async fn fetch_ticket(&self, ticket: &LoadTicket) -> Result<Vec<MediaItem>> {
        fetch_page_for(self.client.as_ref(), ticket.filter, ticket.page).await
    }

    /// Final phase: fold the fetch result back into the session. A ticket
    /// from a superseded generation only clears the in-flight flag; its
    /// batch never reaches the item list.
    pub fn apply(&mut self, ticket: LoadTicket, result: Result<Vec<MediaItem>>) -> Applied {
        self.session.is_loading_more = false;
        if ticket.generation != self.session.generation {
            debug!(
                ticket = ticket.generation,
                current = self.session.generation,
                "Discarding stale load"
            );
            return Applied::Stale;
        }
        match result {
            Ok(batch) => {
                let added = batch.len();
                self.session.has_more = added > 0;
                self.session.items.extend(batch);
                self.session.page += 1;
                Applied::Appended(added)
            }
            Err(e) => {
                error!("Load more failed: {}", e);
                Applied::Failed
            }
        }
    }

    /// Convenience composition of the three phases for callers that
    /// serialize loads themselves. Returns [`Applied::Skipped`] when the
    /// load was gated off rather than fetched-and-empty.
    pub async fn load_more(&mut self) -> Applied {
        let Some(ticket) = self.begin_load_more() else {
            return Applied::Skipped;
        };
        let result = self.fetch_ticket(&ticket).await;
        self.apply(ticket, result)
    }
}

async fn fetch_page_for(
    client: &dyn TmdbApi,
    filter: FeedFilter,
    page: u32,
) -> Result<Vec<MediaItem>> {
    match filter.category_list() {
        None => client
            .search_or_trending("", page, KindFilter::All)
            .await
            .map(|p| p.results),
        Some(list) => client.fetch_category_list(list, page).await,
    }
}
