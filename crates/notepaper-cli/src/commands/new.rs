use notepaper_core::{Note, NotesWorkspace};

use crate::commands::common::{open_workspace, resolve_note_content};
use crate::error::CliError;

pub async fn run_new(
    profile: Option<&str>,
    title: Option<String>,
    content_parts: &[String],
) -> Result<(), CliError> {
    let content = resolve_note_content(content_parts, title.is_some())?;
    let workspace = open_workspace(profile).await?;
    let note = create_note(&workspace, title.unwrap_or_default(), content).await?;
    println!("{}", note.id);
    Ok(())
}

/// Create a note, write its initial draft, and wait for the save.
pub async fn create_note(
    workspace: &NotesWorkspace,
    title: String,
    content: String,
) -> Result<Note, CliError> {
    let created = workspace.create_note().await?;
    let sync = workspace.sync();
    sync.set_title(title).await;
    sync.set_content(content).await;
    sync.save().await?;
    sync.wait_idle().await;

    Ok(sync
        .selection()
        .await
        .map_or(created, |selection| selection.note))
}
