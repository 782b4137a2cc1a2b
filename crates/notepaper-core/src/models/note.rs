//! Note model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::NotesFilter;

/// Opaque identifier of a remote note row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Create a new random note ID (the backend normally assigns these)
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A note row as stored in the remote `notes` collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Owning identity; the backend policy scopes every query to it
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub starred: bool,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// The editable fields of this note as a draft
    #[must_use]
    pub fn draft(&self) -> Draft {
        Draft {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }

    /// Case-insensitive substring match on title or content.
    #[must_use]
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.title.to_lowercase().contains(&term) || self.content.to_lowercase().contains(&term)
    }

    /// Whether this note would be returned by a query with the given filter
    #[must_use]
    pub fn matches(&self, filter: &NotesFilter) -> bool {
        if filter.starred_only && !self.starred {
            return false;
        }
        filter
            .search_term()
            .map_or(true, |term| self.matches_search(term))
    }

    /// Title for list rendering; blank titles fall back to the first content line
    #[must_use]
    pub fn display_title(&self, max_len: usize) -> String {
        let source = if self.title.trim().is_empty() {
            self.content.lines().next().unwrap_or("")
        } else {
            self.title.as_str()
        };
        let trimmed = source.trim();
        if trimmed.is_empty() {
            "Untitled".to_string()
        } else {
            trimmed.chars().take(max_len).collect()
        }
    }
}

/// Client-local editable copy of a note's title and content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub title: String,
    pub content: String,
}

/// Partial update sent to the remote store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
}

impl NotePatch {
    /// Patch carrying both editable text fields of a draft
    #[must_use]
    pub fn from_draft(draft: &Draft) -> Self {
        Self {
            title: Some(draft.title.clone()),
            content: Some(draft.content.clone()),
            starred: None,
        }
    }

    /// Patch touching only the starred flag
    #[must_use]
    pub const fn starred(starred: bool) -> Self {
        Self {
            title: None,
            content: None,
            starred: Some(starred),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.starred.is_none()
    }

    /// Apply this patch onto a note in place (used by in-memory stores)
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title.clone_from(title);
        }
        if let Some(content) = &self.content {
            note.content.clone_from(content);
        }
        if let Some(starred) = self.starred {
            note.starred = starred;
        }
    }
}

#[cfg(test)]
pub(crate) fn test_note(title: &str, content: &str) -> Note {
    let now = Utc::now();
    Note {
        id: NoteId::new(),
        user_id: "user-1".to_string(),
        title: title.to_string(),
        content: content.to_string(),
        starred: false,
        updated_at: now,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_note_id_parse() {
        let id = NoteId::new();
        let parsed: NoteId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_note_deserializes_postgrest_row() {
        let row = r#"{
            "id": "0b6f5b0e-3f0e-4a53-9d4a-4f9f2c1f4b11",
            "user_id": "5d2c7c4e-0000-4000-8000-000000000001",
            "title": "Groceries",
            "content": "milk",
            "starred": true,
            "updated_at": "2024-05-01T10:00:00.123456+00:00",
            "created_at": "2024-04-30T09:00:00+00:00"
        }"#;
        let note: Note = serde_json::from_str(row).unwrap();
        assert_eq!(note.title, "Groceries");
        assert!(note.starred);
        assert!(note.updated_at > note.created_at);
    }

    #[test]
    fn test_matches_search_is_case_insensitive_on_title_or_content() {
        let note = test_note("Shopping List", "Buy MILK and eggs");
        assert!(note.matches_search("shopping"));
        assert!(note.matches_search("milk"));
        assert!(!note.matches_search("bread"));
    }

    #[test]
    fn test_matches_respects_starred_only() {
        let mut note = test_note("a", "b");
        let filter = NotesFilter {
            starred_only: true,
            search: None,
        };
        assert!(!note.matches(&filter));
        note.starred = true;
        assert!(note.matches(&filter));
    }

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = NotePatch::starred(true);
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"starred":true}"#);

        let draft = Draft {
            title: "T".to_string(),
            content: "C".to_string(),
        };
        let patch = NotePatch::from_draft(&draft);
        assert_eq!(
            serde_json::to_string(&patch).unwrap(),
            r#"{"title":"T","content":"C"}"#
        );
    }

    #[test]
    fn test_display_title_falls_back_to_content() {
        assert_eq!(test_note("", "first\nsecond").display_title(40), "first");
        assert_eq!(test_note("  ", "").display_title(40), "Untitled");
        assert_eq!(test_note("Long title", "").display_title(4), "Long");
    }
}
