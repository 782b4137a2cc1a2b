//! Note list filter

use serde::{Deserialize, Serialize};

/// Fixed number of notes per fetched page
pub const NOTES_PAGE_SIZE: usize = 20;

/// Filter applied to the paginated note list
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotesFilter {
    /// Only return starred notes
    pub starred_only: bool,
    /// Free-text search over title and content
    pub search: Option<String>,
}

impl NotesFilter {
    /// Build a filter, treating a blank search term as no search.
    #[must_use]
    pub fn new(starred_only: bool, search: Option<String>) -> Self {
        Self {
            starred_only,
            search: search.filter(|term| !term.trim().is_empty()),
        }
    }

    /// The search term as typed; blank terms count as no search
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .filter(|term| !term.trim().is_empty())
    }
}
