//! Data models for Notepaper

mod filter;
mod note;

pub use filter::{NotesFilter, NOTES_PAGE_SIZE};
pub use note::{Draft, Note, NoteId, NotePatch};

#[cfg(test)]
pub(crate) use note::test_note;
