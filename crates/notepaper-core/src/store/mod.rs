//! Remote note store contract and its implementations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::AuthUser;
use crate::models::{Note, NoteId, NotePatch, NotesFilter};
use crate::Result;

#[cfg(any(test, feature = "memory-store"))]
mod memory;
mod postgrest;

#[cfg(any(test, feature = "memory-store"))]
pub use memory::{MemoryNoteStore, Operation};
pub use postgrest::SupabaseNoteStore;

/// CRUD over the single `notes` collection, scoped to the signed-in identity.
///
/// Every call may fail with a transport or policy error; callers never assume
/// success.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Fetch one page of notes ordered by `updated_at` descending.
    async fn list_notes(
        &self,
        filter: &NotesFilter,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Note>>;

    /// The identity the store is currently acting for.
    async fn current_identity(&self) -> Result<AuthUser>;

    /// Insert a blank, unstarred note owned by `owner`.
    async fn insert_note(&self, owner: &AuthUser) -> Result<Note>;

    /// Apply a partial update and return the persisted row.
    async fn update_note(&self, id: &NoteId, patch: &NotePatch) -> Result<Note>;

    async fn delete_note(&self, id: &NoteId) -> Result<()>;
}

/// Shared handle to a note store
pub type SharedNoteStore = Arc<dyn NoteStore>;
