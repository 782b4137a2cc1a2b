use notepaper_core::{DeleteOutcome, NotesWorkspace};

use crate::commands::common::{confirm, open_workspace, select_note};
use crate::error::CliError;

pub async fn run_delete(profile: Option<&str>, id: &str, yes: bool) -> Result<(), CliError> {
    let workspace = open_workspace(profile).await?;
    let outcome = delete_note(&workspace, id, |title| {
        yes || confirm(&format!("Delete \"{title}\"?")).unwrap_or(false)
    })
    .await?;

    match outcome {
        DeleteOutcome::Deleted(id) => println!("{id}"),
        DeleteOutcome::Cancelled => println!("Cancelled"),
    }
    Ok(())
}

pub async fn delete_note(
    workspace: &NotesWorkspace,
    id: &str,
    confirm: impl FnOnce(&str) -> bool,
) -> Result<DeleteOutcome, CliError> {
    select_note(workspace, id).await?;
    Ok(workspace
        .delete_selected(|note| confirm(&note.display_title(60)))
        .await?)
}
