use notepaper_core::{FlushOutcome, NotesWorkspace};

use crate::commands::common::{
    edit_in_editor, open_workspace, parse_editor_document, render_editor_document,
    select_note,
};
use crate::error::CliError;

pub async fn run_edit(
    profile: Option<&str>,
    id: &str,
    title: Option<String>,
    content: Option<String>,
) -> Result<(), CliError> {
    let workspace = open_workspace(profile).await?;
    let note = select_note(&workspace, id).await?;

    let (title, content) = if title.is_none() && content.is_none() {
        let document = edit_in_editor(&render_editor_document(&note.draft()))?;
        if document.trim().is_empty() {
            return Err(CliError::NothingToEdit);
        }
        let draft = parse_editor_document(&document);
        (Some(draft.title), Some(draft.content))
    } else {
        (title, content)
    };

    match apply_edit(&workspace, title, content).await? {
        FlushOutcome::Clean => println!("No changes to {}", note.id),
        _ => println!("{}", note.id),
    }
    Ok(())
}

/// Apply new field values to the selected note's draft and persist them.
pub async fn apply_edit(
    workspace: &NotesWorkspace,
    title: Option<String>,
    content: Option<String>,
) -> Result<FlushOutcome, CliError> {
    let sync = workspace.sync();
    if let Some(title) = title {
        sync.set_title(title).await;
    }
    if let Some(content) = content {
        sync.set_content(content).await;
    }
    let outcome = sync.save().await?;
    sync.wait_idle().await;
    Ok(outcome)
}
