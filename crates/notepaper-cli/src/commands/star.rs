use notepaper_core::{Note, NotesWorkspace};

use crate::commands::common::{open_workspace, select_note};
use crate::error::CliError;

pub async fn run_star(profile: Option<&str>, id: &str) -> Result<(), CliError> {
    let workspace = open_workspace(profile).await?;
    let note = toggle_star(&workspace, id).await?;
    let label = if note.starred { "Starred" } else { "Unstarred" };
    println!("{label} {}", note.id);
    Ok(())
}

pub async fn toggle_star(workspace: &NotesWorkspace, id: &str) -> Result<Note, CliError> {
    let selected = select_note(workspace, id).await?;
    Ok(workspace.toggle_star().await?.unwrap_or(selected))
}
