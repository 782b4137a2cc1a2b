//! The notes screen: list, selection, and the actions wired between them.

use std::sync::Arc;

use crate::models::{Note, NoteId, NotesFilter};
use crate::notify::{NoticeLevel, SharedNotifier};
use crate::query::{NotesQuery, NotesSnapshot};
use crate::store::SharedNoteStore;
use crate::sync::{DeleteOutcome, DraftSynchronizer};
use crate::{Error, Result};

const CREATE_FAILED: &str = "Unable to create note.";

/// Length of the id prefix shown when a lookup is ambiguous
const SHORT_ID_LEN: usize = 13;

#[derive(Clone)]
pub struct NotesWorkspace {
    store: SharedNoteStore,
    query: NotesQuery,
    sync: DraftSynchronizer,
    notifier: SharedNotifier,
}

impl NotesWorkspace {
    pub fn new(store: SharedNoteStore, notifier: SharedNotifier) -> Self {
        let query = NotesQuery::new(Arc::clone(&store));
        let sync = DraftSynchronizer::new(Arc::clone(&store), query.clone(), Arc::clone(&notifier));
        Self {
            store,
            query,
            sync,
            notifier,
        }
    }

    pub const fn query(&self) -> &NotesQuery {
        &self.query
    }

    pub const fn sync(&self) -> &DraftSynchronizer {
        &self.sync
    }

    pub async fn snapshot(&self) -> NotesSnapshot {
        self.query.snapshot().await
    }

    /// Load the first page and select the newest note.
    pub async fn open(&self) -> Result<()> {
        self.query.revalidate().await?;
        self.ensure_selection().await;
        Ok(())
    }

    /// Create a blank note and select it.
    pub async fn create_note(&self) -> Result<Note> {
        let created = async {
            let owner = self.store.current_identity().await?;
            self.store.insert_note(&owner).await
        }
        .await;

        let note = match created {
            Ok(note) => note,
            Err(error) => {
                tracing::error!("Failed to create note: {}", error);
                self.notifier.notify(CREATE_FAILED, NoticeLevel::Error);
                return Err(error);
            }
        };

        tracing::debug!("Created note {}", note.id);
        self.query.insert_note(note.clone()).await;
        if let Err(error) = self.query.revalidate().await {
            tracing::warn!("Failed to refresh notes after create: {}", error);
        }
        self.sync.select(&note).await;
        Ok(note)
    }

    /// Select a note that is present in the loaded pages.
    pub async fn select(&self, id: &NoteId) -> Result<Note> {
        let note = self
            .query
            .find(id)
            .await
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        self.sync.select(&note).await;
        Ok(note)
    }

    /// Keep the selection pointing at a loaded note, falling back to the first
    /// one, or to nothing when the list is empty.
    pub async fn ensure_selection(&self) -> Option<NoteId> {
        let snapshot = self.query.snapshot().await;
        if let Some(selected) = self.sync.selected_id().await {
            if snapshot.contains(&selected) {
                return Some(selected);
            }
        }

        let first = snapshot.iter().next().cloned();
        match first {
            Some(first) => {
                self.sync.select(&first).await;
                Some(first.id)
            }
            None => {
                self.sync.clear().await;
                None
            }
        }
    }

    pub async fn set_filter(&self, filter: NotesFilter) -> Result<()> {
        self.query.set_filter(filter).await?;
        self.ensure_selection().await;
        Ok(())
    }

    pub async fn set_search(&self, search: Option<String>) -> Result<()> {
        let starred_only = self.query.snapshot().await.filter.starred_only;
        self.set_filter(NotesFilter::new(starred_only, search)).await
    }

    pub async fn set_starred_only(&self, starred_only: bool) -> Result<()> {
        let search = self.query.snapshot().await.filter.search;
        self.set_filter(NotesFilter::new(starred_only, search)).await
    }

    pub async fn load_more(&self) -> Result<bool> {
        self.query.load_more().await
    }

    /// Resolve a full id or a unique id prefix, loading further pages as needed.
    pub async fn find_note_by_prefix(&self, prefix: &str) -> Result<Note> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return Err(Error::InvalidInput("Note id must not be empty".to_string()));
        }

        if self.query.snapshot().await.size() == 0 {
            self.query.revalidate().await?;
            self.query.wait_until_idle().await;
        }

        loop {
            let snapshot = self.query.snapshot().await;
            if let Ok(id) = prefix.parse::<NoteId>() {
                if let Some(note) = snapshot.find(&id) {
                    return Ok(note.clone());
                }
            }

            let matches = snapshot
                .iter()
                .filter(|note| note.id.as_str().starts_with(&prefix))
                .collect::<Vec<_>>();
            if matches.len() > 1 {
                let candidates = matches
                    .iter()
                    .map(|note| note.id.as_str().chars().take(SHORT_ID_LEN).collect::<String>())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(Error::InvalidInput(format!(
                    "Note id prefix '{prefix}' is ambiguous: {candidates}"
                )));
            }

            if !snapshot.has_more {
                return matches
                    .first()
                    .map(|note| (*note).clone())
                    .ok_or_else(|| Error::NotFound(prefix.clone()));
            }
            // Another fetch holds the list; let it land before looking again.
            if !self.query.load_more().await? {
                self.query.wait_until_idle().await;
            }
        }
    }

    pub async fn toggle_star(&self) -> Result<Option<Note>> {
        self.sync.toggle_star().await
    }

    /// Delete the selected note after confirmation and move the selection on.
    pub async fn delete_selected(
        &self,
        confirm: impl FnOnce(&Note) -> bool,
    ) -> Result<DeleteOutcome> {
        let outcome = self.sync.delete_selected(confirm).await?;
        if matches!(outcome, DeleteOutcome::Deleted(_)) {
            self.ensure_selection().await;
        }
        Ok(outcome)
    }
}
