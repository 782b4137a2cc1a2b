//! notepaper-core - Core library for Notepaper
//!
//! This crate contains the models, the hosted backend clients, and the client
//! state (paginated note list, draft synchronization) shared by every Notepaper
//! front end.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod notify;
pub mod query;
pub mod schedule;
pub mod session;
pub mod store;
pub mod sync;
pub mod util;
pub mod workspace;

pub use context::AppContext;
pub use error::{Error, Result};
pub use models::{Draft, Note, NoteId, NotePatch, NotesFilter, NOTES_PAGE_SIZE};
pub use notify::{NoticeLevel, Notifier, SharedNotifier};
pub use query::{NotesQuery, NotesSnapshot};
pub use session::{GuardView, Navigator, SessionGuard, SessionState};
pub use store::{NoteStore, SharedNoteStore};
pub use sync::{DeleteOutcome, DraftStatus, DraftSynchronizer, FlushOutcome};
pub use workspace::NotesWorkspace;
