use chrono::Utc;
use notepaper_core::{NotesFilter, NotesWorkspace};

use crate::commands::common::{format_note_lines, note_to_list_item, open_workspace, NoteListItem};
use crate::error::CliError;

pub async fn run_list(
    profile: Option<&str>,
    starred: bool,
    search: Option<String>,
    pages: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let workspace = open_workspace(profile).await?;
    list_pages(&workspace, NotesFilter::new(starred, search), pages, as_json).await
}

pub async fn list_pages(
    workspace: &NotesWorkspace,
    filter: NotesFilter,
    pages: usize,
    as_json: bool,
) -> Result<(), CliError> {
    workspace.set_filter(filter).await?;
    for _ in 1..pages.max(1) {
        if !workspace.load_more().await? {
            break;
        }
    }

    let snapshot = workspace.snapshot().await;
    let notes = snapshot.notes();
    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if notes.is_empty() {
        println!("No notes found.");
    }
    for line in format_note_lines(&notes, Utc::now().timestamp_millis()) {
        println!("{line}");
    }
    if snapshot.has_more {
        println!(
            "More notes available; pass --pages {} to load them.",
            snapshot.size() + 1
        );
    }
    Ok(())
}
