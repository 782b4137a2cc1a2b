//! Paginated, filterable note list with a copy-on-write page cache.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::models::{Note, NoteId, NotesFilter, NOTES_PAGE_SIZE};
use crate::store::SharedNoteStore;
use crate::Result;

/// One fetched page, shared between snapshots
pub type Page = Arc<Vec<Note>>;

/// Immutable view of the cache at one point in time.
#[derive(Debug, Clone)]
pub struct NotesSnapshot {
    pub filter: NotesFilter,
    pub pages: Arc<Vec<Page>>,
    pub has_more: bool,
    pub is_validating: bool,
    /// Last read failure, cleared by the next successful fetch
    pub error: Option<String>,
}

impl NotesSnapshot {
    /// Number of loaded pages
    pub fn size(&self) -> usize {
        self.pages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.pages.iter().flat_map(|page| page.iter())
    }

    /// The concatenated note list
    pub fn notes(&self) -> Vec<Note> {
        self.iter().cloned().collect()
    }

    pub fn find(&self, id: &NoteId) -> Option<&Note> {
        self.iter().find(|note| note.id == *id)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.find(id).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Apply {
    Replace,
    Append,
}

/// A fetch prepared under the lock and executed without it.
struct FetchPlan {
    generation: u64,
    ticket: u64,
    filter: NotesFilter,
    first_page: usize,
    count: usize,
    apply: Apply,
}

#[derive(Default)]
struct QueryState {
    filter: NotesFilter,
    pages: Arc<Vec<Page>>,
    /// Bumped on every filter change; results from older generations are dropped
    generation: u64,
    active_fetch: Option<u64>,
    next_ticket: u64,
    revalidate_queued: bool,
    error: Option<String>,
}

impl QueryState {
    fn begin_fetch(&mut self) -> u64 {
        self.next_ticket += 1;
        self.active_fetch = Some(self.next_ticket);
        self.next_ticket
    }

    fn plan(&mut self, first_page: usize, count: usize, apply: Apply) -> FetchPlan {
        FetchPlan {
            generation: self.generation,
            ticket: self.begin_fetch(),
            filter: self.filter.clone(),
            first_page,
            count,
            apply,
        }
    }

    /// Replace the page list with a patched copy.
    fn rewrite(&mut self, mut edit: impl FnMut(&Note) -> Option<Note>) -> bool {
        let mut changed = false;
        let pages = self
            .pages
            .iter()
            .map(|page| {
                let rewritten = page
                    .iter()
                    .filter_map(|note| {
                        let next = edit(note);
                        if next.as_ref() != Some(note) {
                            changed = true;
                        }
                        next
                    })
                    .collect::<Vec<_>>();
                Arc::new(rewritten)
            })
            .collect::<Vec<_>>();
        if changed {
            self.pages = Arc::new(pages);
        }
        changed
    }
}

fn has_more(pages: &[Page], page_size: usize) -> bool {
    pages
        .last()
        .is_some_and(|page| !page.is_empty() && page.len() == page_size)
}

/// The note list shown to the user: pages of notes for the current filter.
#[derive(Clone)]
pub struct NotesQuery {
    store: SharedNoteStore,
    page_size: usize,
    state: Arc<Mutex<QueryState>>,
    /// Ticks whenever a fetch finishes
    settled: Arc<watch::Sender<u64>>,
}

impl NotesQuery {
    pub fn new(store: SharedNoteStore) -> Self {
        Self::with_page_size(store, NOTES_PAGE_SIZE)
    }

    pub fn with_page_size(store: SharedNoteStore, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            state: Arc::new(Mutex::new(QueryState::default())),
            settled: Arc::new(watch::channel(0).0),
        }
    }

    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn snapshot(&self) -> NotesSnapshot {
        let state = self.state.lock().await;
        NotesSnapshot {
            filter: state.filter.clone(),
            pages: Arc::clone(&state.pages),
            has_more: has_more(&state.pages, self.page_size),
            is_validating: state.active_fetch.is_some(),
            error: state.error.clone(),
        }
    }

    pub async fn find(&self, id: &NoteId) -> Option<Note> {
        self.snapshot().await.find(id).cloned()
    }

    /// Switch filters: drop every loaded page and fetch the first page again.
    ///
    /// Setting the filter that is already loaded is a no-op.
    pub async fn set_filter(&self, filter: NotesFilter) -> Result<()> {
        let plan = {
            let mut state = self.state.lock().await;
            if state.filter == filter && !state.pages.is_empty() {
                return Ok(());
            }
            state.filter = filter;
            state.generation += 1;
            state.pages = Arc::new(Vec::new());
            state.revalidate_queued = false;
            state.error = None;
            state.plan(0, 1, Apply::Replace)
        };
        tracing::debug!(filter = ?plan.filter, "Notes filter changed; reset to first page");
        self.run_then_drain(plan).await
    }

    /// Fetch the next page, if more data is believed available and no fetch is
    /// in flight. Returns whether a page was requested.
    pub async fn load_more(&self) -> Result<bool> {
        let plan = {
            let mut state = self.state.lock().await;
            if state.active_fetch.is_some() || !has_more(&state.pages, self.page_size) {
                return Ok(false);
            }
            let next_page = state.pages.len();
            state.plan(next_page, 1, Apply::Append)
        };
        self.run_then_drain(plan).await?;
        Ok(true)
    }

    /// Refetch every loaded page (at least the first one).
    ///
    /// Calls made while another fetch is in flight coalesce into a single
    /// follow-up revalidation run after that fetch completes.
    pub async fn revalidate(&self) -> Result<()> {
        loop {
            let plan = {
                let mut state = self.state.lock().await;
                if state.active_fetch.is_some() {
                    state.revalidate_queued = true;
                    tracing::debug!("Revalidation already in flight; coalesced");
                    return Ok(());
                }
                let count = state.pages.len().max(1);
                state.plan(0, count, Apply::Replace)
            };
            if !self.run_fetch(plan).await? {
                return Ok(());
            }
        }
    }

    /// Wait until no fetch is in flight.
    pub async fn wait_until_idle(&self) {
        let mut settled = self.settled.subscribe();
        while self.state.lock().await.active_fetch.is_some() {
            if settled.changed().await.is_err() {
                return;
            }
        }
    }

    /// Merge a persisted note into whichever page holds it.
    pub async fn patch_note(&self, updated: &Note) -> bool {
        let mut state = self.state.lock().await;
        state.rewrite(|note| {
            if note.id == updated.id {
                Some(updated.clone())
            } else {
                Some(note.clone())
            }
        })
    }

    /// Drop a note from every cached page.
    pub async fn remove_note(&self, id: &NoteId) -> bool {
        let mut state = self.state.lock().await;
        state.rewrite(|note| (note.id != *id).then(|| note.clone()))
    }

    /// Show a freshly created note at the top of the list when it matches the
    /// current filter. The page may briefly exceed the page size until the
    /// next revalidation.
    pub async fn insert_note(&self, note: Note) -> bool {
        let mut state = self.state.lock().await;
        let already_cached = state
            .pages
            .iter()
            .flat_map(|page| page.iter())
            .any(|existing| existing.id == note.id);
        if already_cached || !note.matches(&state.filter) {
            return false;
        }
        let mut pages = state.pages.as_ref().clone();
        match pages.first_mut() {
            Some(first) => {
                let mut notes = Vec::with_capacity(first.len() + 1);
                notes.push(note);
                notes.extend(first.iter().cloned());
                *first = Arc::new(notes);
            }
            None => pages.push(Arc::new(vec![note])),
        }
        state.pages = Arc::new(pages);
        true
    }

    async fn run_then_drain(&self, plan: FetchPlan) -> Result<()> {
        if self.run_fetch(plan).await? {
            if let Err(error) = self.revalidate().await {
                tracing::warn!("Queued revalidation failed: {}", error);
            }
        }
        Ok(())
    }

    /// Execute a fetch and apply it if the filter has not changed meanwhile.
    ///
    /// Returns whether a revalidation was queued while the fetch was running.
    async fn run_fetch(&self, plan: FetchPlan) -> Result<bool> {
        let result = self
            .fetch_pages(&plan.filter, plan.first_page, plan.count)
            .await;

        let mut state = self.state.lock().await;
        if state.active_fetch == Some(plan.ticket) {
            state.active_fetch = None;
        }
        self.settled.send_modify(|count| *count += 1);
        if state.generation != plan.generation {
            tracing::debug!("Discarding notes fetched for a previous filter");
            return Ok(false);
        }

        match result {
            Ok(fetched) => {
                state.pages = match plan.apply {
                    Apply::Replace => Arc::new(fetched),
                    Apply::Append => {
                        let mut pages = state.pages.as_ref().clone();
                        pages.extend(fetched);
                        Arc::new(pages)
                    }
                };
                state.error = None;
                Ok(std::mem::take(&mut state.revalidate_queued))
            }
            Err(error) => {
                tracing::warn!("Failed to load notes: {}", error);
                state.error = Some(error.to_string());
                state.revalidate_queued = false;
                Err(error)
            }
        }
    }

    async fn fetch_pages(
        &self,
        filter: &NotesFilter,
        first_page: usize,
        count: usize,
    ) -> Result<Vec<Page>> {
        let mut pages = Vec::with_capacity(count);
        for index in first_page..first_page + count {
            let notes = self.store.list_notes(filter, index, self.page_size).await?;
            let short = notes.len() < self.page_size;
            pages.push(Arc::new(notes));
            if short {
                break;
            }
        }
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::{MemoryNoteStore, Operation};

    async fn seeded(count: usize) -> (MemoryNoteStore, NotesQuery) {
        let store = MemoryNoteStore::new("user-1");
        for index in 0..count {
            store.seed(&format!("note {index}"), "body", false).await;
        }
        let query = NotesQuery::new(Arc::new(store.clone()));
        (store, query)
    }

    #[tokio::test]
    async fn exactly_one_full_page_has_more() {
        let (_store, query) = seeded(20).await;
        query.revalidate().await.unwrap();
        let snapshot = query.snapshot().await;
        assert_eq!(snapshot.iter().count(), 20);
        assert!(snapshot.has_more);
    }

    #[tokio::test]
    async fn short_page_has_no_more() {
        let (_store, query) = seeded(19).await;
        query.revalidate().await.unwrap();
        assert!(!query.snapshot().await.has_more);
    }

    #[tokio::test]
    async fn empty_list_has_no_more() {
        let (_store, query) = seeded(0).await;
        query.revalidate().await.unwrap();
        let snapshot = query.snapshot().await;
        assert_eq!(snapshot.size(), 1);
        assert!(!snapshot.has_more);
    }

    #[tokio::test]
    async fn load_more_appends_until_short_page() {
        let (store, query) = seeded(25).await;
        query.revalidate().await.unwrap();

        assert!(query.load_more().await.unwrap());
        let snapshot = query.snapshot().await;
        assert_eq!(snapshot.size(), 2);
        assert_eq!(snapshot.pages[1].len(), 5);
        assert!(!snapshot.has_more);

        let calls = store.calls(Operation::List);
        assert!(!query.load_more().await.unwrap());
        assert_eq!(store.calls(Operation::List), calls);
    }

    #[tokio::test]
    async fn full_last_page_followed_by_empty_page_ends_pagination() {
        let (_store, query) = seeded(40).await;
        query.revalidate().await.unwrap();
        assert!(query.load_more().await.unwrap());
        assert!(query.snapshot().await.has_more);

        assert!(query.load_more().await.unwrap());
        let snapshot = query.snapshot().await;
        assert_eq!(snapshot.size(), 3);
        assert!(snapshot.pages[2].is_empty());
        assert!(!snapshot.has_more);
    }

    #[tokio::test]
    async fn pages_are_ordered_newest_first() {
        let (_store, query) = seeded(3).await;
        query.revalidate().await.unwrap();
        let titles = query
            .snapshot()
            .await
            .iter()
            .map(|note| note.title.clone())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["note 2", "note 1", "note 0"]);
    }

    #[tokio::test]
    async fn filter_change_resets_to_first_page() {
        let (store, query) = seeded(45).await;
        store.seed("Milk run", "", true).await;
        query.revalidate().await.unwrap();
        query.load_more().await.unwrap();
        assert_eq!(query.snapshot().await.size(), 2);

        query
            .set_filter(NotesFilter::new(false, Some("NOTE".to_string())))
            .await
            .unwrap();
        let snapshot = query.snapshot().await;
        assert_eq!(snapshot.size(), 1);
        assert_eq!(snapshot.pages[0].len(), 20);
        assert!(snapshot.iter().all(|note| note.title.starts_with("note")));

        query
            .set_filter(NotesFilter::new(true, None))
            .await
            .unwrap();
        let snapshot = query.snapshot().await;
        assert_eq!(snapshot.size(), 1);
        assert_eq!(
            snapshot.iter().map(|note| note.title.as_str()).collect::<Vec<_>>(),
            vec!["Milk run"]
        );
    }

    #[tokio::test]
    async fn search_matches_content_case_insensitively() {
        let (store, query) = seeded(0).await;
        store.seed("Errands", "buy MILK", false).await;
        store.seed("Other", "nothing", false).await;

        query
            .set_filter(NotesFilter::new(false, Some("milk".to_string())))
            .await
            .unwrap();
        let notes = query.snapshot().await.notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Errands");
    }

    #[tokio::test]
    async fn same_filter_does_not_refetch() {
        let (store, query) = seeded(2).await;
        query.set_filter(NotesFilter::default()).await.unwrap();
        let calls = store.calls(Operation::List);
        query.set_filter(NotesFilter::default()).await.unwrap();
        assert_eq!(store.calls(Operation::List), calls);
    }

    #[tokio::test]
    async fn patch_is_copy_on_write() {
        let (_store, query) = seeded(2).await;
        query.revalidate().await.unwrap();
        let before = query.snapshot().await;

        let mut updated = before.notes()[0].clone();
        updated.title = "patched".to_string();
        assert!(query.patch_note(&updated).await);

        assert_eq!(before.notes()[0].title, "note 1");
        assert_eq!(query.snapshot().await.notes()[0].title, "patched");
    }

    #[tokio::test]
    async fn remove_drops_note_from_every_page() {
        let (_store, query) = seeded(25).await;
        query.revalidate().await.unwrap();
        query.load_more().await.unwrap();
        let target = query.snapshot().await.pages[1][0].id;

        assert!(query.remove_note(&target).await);
        let snapshot = query.snapshot().await;
        assert!(!snapshot.contains(&target));
        assert_eq!(snapshot.iter().count(), 24);
        assert!(!query.remove_note(&target).await);
    }

    #[tokio::test]
    async fn insert_respects_filter() {
        let (store, query) = seeded(1).await;
        query.revalidate().await.unwrap();
        let blank = store.seed("", "", false).await;

        assert!(query.insert_note(blank.clone()).await);
        assert_eq!(query.snapshot().await.notes()[0].id, blank.id);
        assert!(!query.insert_note(blank).await);

        query.set_filter(NotesFilter::new(true, None)).await.unwrap();
        let another = store.seed("", "", false).await;
        assert!(!query.insert_note(another).await);
    }

    #[tokio::test]
    async fn read_failure_is_a_retryable_error_state() {
        let (store, query) = seeded(3).await;
        store.fail_next(Operation::List).await;

        assert!(query.revalidate().await.is_err());
        let snapshot = query.snapshot().await;
        assert!(snapshot.error.is_some());
        assert!(!snapshot.is_validating);

        query.revalidate().await.unwrap();
        let snapshot = query.snapshot().await;
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.iter().count(), 3);
    }

    #[tokio::test]
    async fn concurrent_revalidations_coalesce_into_one_follow_up() {
        let (store, query) = seeded(3).await;
        store.hold(Operation::List).await;

        let first = tokio::spawn({
            let query = query.clone();
            async move { query.revalidate().await }
        });
        store.wait_for_calls(Operation::List, 1).await;
        assert!(query.snapshot().await.is_validating);

        query.revalidate().await.unwrap();
        query.revalidate().await.unwrap();

        store.release(Operation::List, 10).await;
        first.await.unwrap().unwrap();

        assert_eq!(store.calls(Operation::List), 2);
        assert!(!query.snapshot().await.is_validating);
    }

    #[tokio::test]
    async fn wait_until_idle_returns_after_fetch_lands() {
        let (store, query) = seeded(3).await;
        query.wait_until_idle().await;
        store.hold(Operation::List).await;

        let fetch = tokio::spawn({
            let query = query.clone();
            async move { query.revalidate().await }
        });
        store.wait_for_calls(Operation::List, 1).await;
        let waiter = tokio::spawn({
            let query = query.clone();
            async move { query.wait_until_idle().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        store.release(Operation::List, 10).await;
        waiter.await.unwrap();
        assert!(!query.snapshot().await.is_validating);
        fetch.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn results_for_a_replaced_filter_are_discarded() {
        let (store, query) = seeded(3).await;
        store.seed("Starred", "", true).await;
        store.hold(Operation::List).await;

        let stale = tokio::spawn({
            let query = query.clone();
            async move { query.set_filter(NotesFilter::new(false, Some("note".into()))).await }
        });
        store.wait_for_calls(Operation::List, 1).await;

        let fresh = tokio::spawn({
            let query = query.clone();
            async move { query.set_filter(NotesFilter::new(true, None)).await }
        });
        store.wait_for_calls(Operation::List, 2).await;

        store.release(Operation::List, 10).await;
        stale.await.unwrap().unwrap();
        fresh.await.unwrap().unwrap();

        let snapshot = query.snapshot().await;
        assert!(snapshot.filter.starred_only);
        assert_eq!(
            snapshot.iter().map(|note| note.title.as_str()).collect::<Vec<_>>(),
            vec!["Starred"]
        );
    }
}
