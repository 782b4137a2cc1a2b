use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] notepaper_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("Nothing to change: pass --title or --content, or edit in $EDITOR")]
    NothingToEdit,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Not signed in. Run `notepaper auth login --email <email> --password <password>` first.")]
    NotSignedIn,
    #[error(
        "Backend is not configured. Run `notepaper config init`, or set NOTEPAPER_SUPABASE_URL and NOTEPAPER_SUPABASE_ANON_KEY."
    )]
    NotConfigured,
}

impl CliError {
    /// Whether running the same command again later may succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Core(error) => error.is_retryable(),
            _ => false,
        }
    }
}
