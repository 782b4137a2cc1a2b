use crate::commands::common::{
    normalize_note_identifier, note_to_list_item, open_workspace, render_note_detail,
};
use crate::error::CliError;

pub async fn run_show(profile: Option<&str>, id: &str, as_json: bool) -> Result<(), CliError> {
    let id = normalize_note_identifier(id)?;
    let workspace = open_workspace(profile).await?;
    let note = workspace.find_note_by_prefix(&id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&note_to_list_item(&note))?);
    } else {
        print!("{}", render_note_detail(&note));
    }
    Ok(())
}
