//! Draft synchronization for the selected note.
//!
//! Edits land in a local draft immediately and reach the remote store after a
//! quiet period, on blur, on explicit save, or when the selection changes.
//! Every remote write goes through a single gate so the store observes them in
//! issue order.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::models::{Draft, Note, NoteId, NotePatch};
use crate::notify::{NoticeLevel, SharedNotifier};
use crate::query::NotesQuery;
use crate::schedule::DelayedTask;
use crate::store::SharedNoteStore;
use crate::Result;

/// Quiet period after the last edit before the draft is persisted
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(800);

const SAVE_FAILED: &str = "Unable to save note.";
const STAR_FAILED: &str = "Unable to update star.";
const DELETE_FAILED: &str = "Unable to delete note.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftStatus {
    /// Draft equals the last persisted snapshot
    Clean,
    /// Local edits not yet persisted
    Dirty,
    /// A save is in flight
    Saving,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to persist
    Clean,
    Saved(Note),
    /// A save was already in flight; another one follows it
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(NoteId),
    Cancelled,
}

/// Read-only view of the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionView {
    /// The note as the user currently sees it, draft applied
    pub note: Note,
    pub status: DraftStatus,
    pub last_saved_at: DateTime<Utc>,
}

struct Selection {
    /// Last persisted version; its starred flag carries optimistic toggles
    persisted: Note,
    draft: Draft,
    saving: bool,
    flush_queued: bool,
    debounce: Option<DelayedTask>,
}

impl Selection {
    fn new(note: &Note, draft: Draft) -> Self {
        Self {
            persisted: note.clone(),
            draft,
            saving: false,
            flush_queued: false,
            debounce: None,
        }
    }

    /// Take a saved version as the new snapshot, keeping the optimistic star.
    /// A draft that was clean follows the saved text.
    fn adopt(&mut self, note: &Note) {
        let was_dirty = self.is_dirty();
        let starred = self.persisted.starred;
        self.persisted = note.clone();
        self.persisted.starred = starred;
        if !was_dirty {
            self.draft = note.draft();
        }
    }

    fn is_dirty(&self) -> bool {
        self.draft.title != self.persisted.title || self.draft.content != self.persisted.content
    }

    fn status(&self) -> DraftStatus {
        if self.saving {
            DraftStatus::Saving
        } else if self.is_dirty() {
            DraftStatus::Dirty
        } else {
            DraftStatus::Clean
        }
    }

    fn current(&self) -> Note {
        Note {
            title: self.draft.title.clone(),
            content: self.draft.content.clone(),
            ..self.persisted.clone()
        }
    }

    fn view(&self) -> SelectionView {
        SelectionView {
            note: self.current(),
            status: self.status(),
            last_saved_at: self.persisted.updated_at,
        }
    }
}

/// Background save of a note the user switched away from.
struct PendingSave {
    id: NoteId,
    draft: Draft,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SyncState {
    selection: Option<Selection>,
    /// Bumped whenever the selection is replaced or cleared
    generation: u64,
    pending: Vec<PendingSave>,
}

impl SyncState {
    /// Draft of the latest unfinished background save for `id`.
    fn pending_draft(&mut self, id: &NoteId) -> Option<Draft> {
        self.pending.retain(|save| !save.handle.is_finished());
        self.pending
            .iter()
            .rev()
            .find(|save| save.id == *id)
            .map(|save| save.draft.clone())
    }
}

struct Inner {
    store: SharedNoteStore,
    query: NotesQuery,
    notifier: SharedNotifier,
    debounce: Duration,
    state: Mutex<SyncState>,
    write_gate: Mutex<()>,
}

impl Inner {
    async fn write(&self, id: &NoteId, patch: &NotePatch) -> Result<Note> {
        let _gate = self.write_gate.lock().await;
        self.store.update_note(id, patch).await
    }

    async fn revalidate(&self) {
        if let Err(error) = self.query.revalidate().await {
            tracing::warn!("Failed to refresh notes after write: {}", error);
        }
    }

    /// Persist a draft for a note that is no longer selected.
    async fn persist_detached(&self, id: NoteId, draft: Draft) {
        match self.write(&id, &NotePatch::from_draft(&draft)).await {
            Ok(note) => {
                tracing::debug!("Saved note {} after switching away", id);
                {
                    let mut state = self.state.lock().await;
                    if let Some(selection) = state
                        .selection
                        .as_mut()
                        .filter(|selection| selection.persisted.id == id && !selection.saving)
                    {
                        selection.adopt(&note);
                    }
                }
                self.query.patch_note(&note).await;
                self.revalidate().await;
            }
            Err(error) => {
                tracing::error!("Failed to save note {}: {}", id, error);
                self.notifier.notify(SAVE_FAILED, NoticeLevel::Error);
            }
        }
    }
}

/// Owns the selected note's draft and its persistence.
#[derive(Clone)]
pub struct DraftSynchronizer {
    inner: Arc<Inner>,
}

impl DraftSynchronizer {
    pub fn new(store: SharedNoteStore, query: NotesQuery, notifier: SharedNotifier) -> Self {
        Self::with_debounce(store, query, notifier, DEBOUNCE_DELAY)
    }

    pub fn with_debounce(
        store: SharedNoteStore,
        query: NotesQuery,
        notifier: SharedNotifier,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                query,
                notifier,
                debounce,
                state: Mutex::new(SyncState::default()),
                write_gate: Mutex::new(()),
            }),
        }
    }

    /// `None` when nothing is selected.
    pub async fn status(&self) -> Option<DraftStatus> {
        let state = self.inner.state.lock().await;
        state.selection.as_ref().map(Selection::status)
    }

    pub async fn selection(&self) -> Option<SelectionView> {
        let state = self.inner.state.lock().await;
        state.selection.as_ref().map(Selection::view)
    }

    pub async fn selected_id(&self) -> Option<NoteId> {
        let state = self.inner.state.lock().await;
        state.selection.as_ref().map(|selection| selection.persisted.id)
    }

    /// Make `note` the selected note, saving the previous draft if dirty.
    ///
    /// The previous note's save runs in the background and never touches the
    /// new selection. Re-selecting a note whose background save is still in
    /// flight starts from the draft being saved, not from `note`.
    pub async fn select(&self, note: &Note) {
        let mut state = self.inner.state.lock().await;
        if state
            .selection
            .as_ref()
            .is_some_and(|selection| selection.persisted.id == note.id)
        {
            return;
        }

        if let Some(previous) = state.selection.take() {
            if previous.is_dirty() {
                let inner = Arc::clone(&self.inner);
                let (id, draft) = (previous.persisted.id, previous.draft.clone());
                let handle = tokio::spawn({
                    let draft = draft.clone();
                    async move { inner.persist_detached(id, draft).await }
                });
                state.pending.push(PendingSave { id, draft, handle });
            }
        }

        let draft = state.pending_draft(&note.id).unwrap_or_else(|| note.draft());
        state.generation += 1;
        state.selection = Some(Selection::new(note, draft));
    }

    /// Drop the selection without saving.
    pub async fn clear(&self) {
        let mut state = self.inner.state.lock().await;
        if state.selection.take().is_some() {
            state.generation += 1;
        }
    }

    pub async fn set_title(&self, title: impl Into<String>) -> bool {
        let title = title.into();
        self.edit(move |draft| draft.title = title).await
    }

    pub async fn set_content(&self, content: impl Into<String>) -> bool {
        let content = content.into();
        self.edit(move |draft| draft.content = content).await
    }

    async fn edit(&self, apply: impl FnOnce(&mut Draft)) -> bool {
        let mut state = self.inner.state.lock().await;
        let generation = state.generation;
        let Some(selection) = state.selection.as_mut() else {
            return false;
        };

        apply(&mut selection.draft);
        selection.debounce = if selection.is_dirty() {
            Some(self.schedule_flush(generation))
        } else {
            None
        };
        true
    }

    fn schedule_flush(&self, generation: u64) -> DelayedTask {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        DelayedTask::spawn(self.inner.debounce, async move {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let sync = Self { inner };
            if sync.inner.state.lock().await.generation != generation {
                return;
            }
            if let Err(error) = sync.flush().await {
                tracing::debug!("Debounced save failed: {}", error);
            }
        })
    }

    /// Editor lost focus: persist pending edits right away.
    pub async fn on_blur(&self) -> Result<FlushOutcome> {
        self.flush().await
    }

    /// Explicit save request.
    pub async fn save(&self) -> Result<FlushOutcome> {
        self.flush().await
    }

    /// Persist the draft if it differs from the last saved snapshot.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        loop {
            let (generation, id, draft) = {
                let mut state = self.inner.state.lock().await;
                let generation = state.generation;
                let Some(selection) = state.selection.as_mut() else {
                    return Ok(FlushOutcome::Clean);
                };
                if selection.saving {
                    selection.flush_queued = true;
                    return Ok(FlushOutcome::Deferred);
                }
                selection.debounce = None;
                if !selection.is_dirty() {
                    return Ok(FlushOutcome::Clean);
                }
                selection.saving = true;
                (generation, selection.persisted.id, selection.draft.clone())
            };

            let result = self.inner.write(&id, &NotePatch::from_draft(&draft)).await;

            let requeue = {
                let mut state = self.inner.state.lock().await;
                let current = state.generation == generation;
                match state.selection.as_mut().filter(|_| current) {
                    Some(selection) => {
                        selection.saving = false;
                        let queued = std::mem::take(&mut selection.flush_queued);
                        if let Ok(note) = &result {
                            let starred = selection.persisted.starred;
                            selection.persisted = note.clone();
                            selection.persisted.starred = starred;
                        }
                        queued && selection.is_dirty()
                    }
                    None => false,
                }
            };

            let note = match result {
                Ok(note) => note,
                Err(error) => {
                    tracing::error!("Failed to save note {}: {}", id, error);
                    self.inner.notifier.notify(SAVE_FAILED, NoticeLevel::Error);
                    return Err(error);
                }
            };

            tracing::debug!("Saved note {}", id);
            self.inner.query.patch_note(&note).await;
            self.inner.revalidate().await;

            if !requeue {
                return Ok(FlushOutcome::Saved(note));
            }
        }
    }

    /// Flip the selected note's star, optimistically.
    ///
    /// A failed write restores the previous flag.
    pub async fn toggle_star(&self) -> Result<Option<Note>> {
        let (generation, id, starred) = {
            let mut state = self.inner.state.lock().await;
            let generation = state.generation;
            let Some(selection) = state.selection.as_mut() else {
                return Ok(None);
            };
            selection.persisted.starred = !selection.persisted.starred;
            (generation, selection.persisted.id, selection.persisted.starred)
        };

        let result = self.inner.write(&id, &NotePatch::starred(starred)).await;

        {
            let mut state = self.inner.state.lock().await;
            let current = state.generation == generation;
            if let Some(selection) = state.selection.as_mut().filter(|_| current) {
                match &result {
                    Ok(note) => {
                        selection.persisted.starred = note.starred;
                        selection.persisted.updated_at = note.updated_at;
                    }
                    Err(_) if selection.persisted.starred == starred => {
                        selection.persisted.starred = !starred;
                    }
                    Err(_) => {}
                }
            }
        }

        match result {
            Ok(note) => {
                self.inner.query.patch_note(&note).await;
                self.inner.revalidate().await;
                Ok(Some(note))
            }
            Err(error) => {
                tracing::error!("Failed to update star on note {}: {}", id, error);
                self.inner.notifier.notify(STAR_FAILED, NoticeLevel::Error);
                Err(error)
            }
        }
    }

    /// Delete the selected note once `confirm` agrees.
    pub async fn delete_selected(
        &self,
        confirm: impl FnOnce(&Note) -> bool,
    ) -> Result<DeleteOutcome> {
        let Some(note) = self.selection().await.map(|view| view.note) else {
            return Ok(DeleteOutcome::Cancelled);
        };
        if !confirm(&note) {
            return Ok(DeleteOutcome::Cancelled);
        }

        let result = {
            let _gate = self.inner.write_gate.lock().await;
            self.inner.store.delete_note(&note.id).await
        };
        if let Err(error) = result {
            tracing::error!("Failed to delete note {}: {}", note.id, error);
            self.inner.notifier.notify(DELETE_FAILED, NoticeLevel::Error);
            return Err(error);
        }

        {
            let mut state = self.inner.state.lock().await;
            if state
                .selection
                .as_ref()
                .is_some_and(|selection| selection.persisted.id == note.id)
            {
                state.selection = None;
                state.generation += 1;
            }
        }
        self.inner.query.remove_note(&note.id).await;
        self.inner.revalidate().await;
        Ok(DeleteOutcome::Deleted(note.id))
    }

    /// Wait for background saves of previously selected notes.
    pub async fn wait_idle(&self) {
        let pending = std::mem::take(&mut self.inner.state.lock().await.pending);
        for save in pending {
            if let Err(error) = save.handle.await {
                tracing::warn!("Background save task failed: {}", error);
            }
        }
    }
}
