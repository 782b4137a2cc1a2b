use std::env;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use notepaper_core::{
    AppContext, Draft, GuardView, Note, NoticeLevel, Notifier, NotesWorkspace, SessionGuard,
};
use serde::Serialize;

use crate::auth::KeyringSessionStore;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub const SHORT_ID_LEN: usize = 13;

/// Prints user-facing notices to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliNotifier;

impl Notifier for CliNotifier {
    fn notify(&self, message: &str, level: NoticeLevel) {
        match level {
            NoticeLevel::Info => eprintln!("{message}"),
            NoticeLevel::Error => eprintln!("! {message}"),
        }
    }
}

pub type CliContext = AppContext<KeyringSessionStore>;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub content: String,
    pub starred: bool,
    pub created_at: String,
    pub updated_at: String,
    pub relative_time: String,
}

/// Build the app context for a profile. Returns the resolved profile name too.
pub fn open_context(profile: Option<&str>) -> Result<(String, CliContext), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let client_config = config
        .client_config(&profile_name)?
        .ok_or(CliError::NotConfigured)?;
    let context = AppContext::init(
        client_config,
        KeyringSessionStore::new(&profile_name),
        Arc::new(CliNotifier),
    )?;
    Ok((profile_name, context))
}

/// Restore the session and hand out a workspace only when signed in.
pub async fn open_workspace(profile: Option<&str>) -> Result<NotesWorkspace, CliError> {
    let (profile_name, context) = open_context(profile)?;
    if let Err(error) = context.restore_session().await {
        tracing::warn!("Failed to restore session for '{}': {}", profile_name, error);
    }

    let mut guard = SessionGuard::new(|| {
        tracing::debug!("No stored session; sign-in required");
    });
    match guard.observe(&context.session_state()) {
        GuardView::Render(session) => {
            tracing::debug!("Using profile '{}' as {}", profile_name, session.user.id);
            Ok(context.workspace())
        }
        GuardView::Placeholder => Err(CliError::NotSignedIn),
    }
}

/// Resolve an id or prefix and make it the workspace selection.
pub async fn select_note(workspace: &NotesWorkspace, id: &str) -> Result<Note, CliError> {
    let id = normalize_note_identifier(id)?;
    let note = workspace.find_note_by_prefix(&id).await?;
    workspace.select(&note.id).await?;
    Ok(note)
}

pub fn short_id(note: &Note) -> String {
    note.id.to_string().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_note_lines(notes: &[Note], now_ms: i64) -> Vec<String> {
    notes
        .iter()
        .map(|note| {
            let star = if note.starred { "*" } else { " " };
            let title = truncate_chars(&note.display_title(80), 30);
            let preview = note_preview(note, 40);
            let relative_time = format_relative_time(note.updated_at.timestamp_millis(), now_ms);
            format!(
                "{:<13} {star} {title:<30}  {preview:<40}  {relative_time}",
                short_id(note)
            )
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        preview: note_preview(note, 80),
        content: note.content.clone(),
        starred: note.starred,
        created_at: note.created_at.to_rfc3339(),
        updated_at: note.updated_at.to_rfc3339(),
        relative_time: format_relative_time(note.updated_at.timestamp_millis(), now_ms),
    }
}

pub fn render_note_detail(note: &Note) -> String {
    let mut rendered = format!(
        "{}{}\nid: {}\nupdated: {}\ncreated: {}\n",
        note.display_title(120),
        if note.starred { " *" } else { "" },
        note.id,
        note.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        note.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
    );
    if !note.content.trim().is_empty() {
        rendered.push('\n');
        rendered.push_str(note.content.trim_end());
        rendered.push('\n');
    }
    rendered
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let first_line = note.content.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, max_chars)
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = value.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Mask all but the first few characters of a credential.
pub fn mask_secret(value: &str) -> String {
    let visible = value.chars().take(6).collect::<String>();
    if value.chars().count() <= 6 {
        "******".to_string()
    } else {
        format!("{visible}...")
    }
}

/// Editor document layout: title on the first line, a blank line, then content
/// and a final newline.
pub fn render_editor_document(draft: &Draft) -> String {
    format!("{}\n\n{}\n", draft.title, draft.content)
}

/// Inverse of [`render_editor_document`]. Only the layout is removed; the text
/// itself is kept exactly as written.
pub fn parse_editor_document(document: &str) -> Draft {
    let (title, rest) = document.split_once('\n').unwrap_or((document, ""));
    let title = title.strip_suffix('\r').unwrap_or(title);
    let content = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);
    let content = content
        .strip_suffix("\r\n")
        .or_else(|| content.strip_suffix('\n'))
        .unwrap_or(content);
    Draft {
        title: title.to_string(),
        content: content.to_string(),
    }
}

pub fn resolve_note_content(
    content_parts: &[String],
    allow_empty: bool,
) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if allow_empty {
        return Ok(String::new());
    }

    if let Some(content) = capture_editor_input_with_initial("")? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

/// Ask a yes/no question on the terminal; anything but "y"/"yes" declines.
pub fn confirm(prompt: &str) -> Result<bool, CliError> {
    let mut stderr = io::stderr();
    write!(stderr, "{prompt} [y/N] ")?;
    stderr.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    Ok(normalize_content(&edit_in_editor(initial_content)?))
}

/// Open `initial_content` in the user's editor and return the saved file as is.
pub fn edit_in_editor(initial_content: &str) -> Result<String, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let document = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(document)
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("notepaper-note-{}-{now}.md", std::process::id()))
}
