//! User-facing notification sink.
//!
//! Diagnostics go to `tracing`; this sink carries the short messages the user
//! should see ("Unable to save note.").

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, level: NoticeLevel);
}

/// Shared handle to a notifier
pub type SharedNotifier = Arc<dyn Notifier>;

/// Keeps every notice in memory; handy for tests and batch front ends.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<(String, NoticeLevel)>>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(String, NoticeLevel)> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter(|(_, level)| *level == NoticeLevel::Error)
            .map(|(message, _)| message)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, level: NoticeLevel) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push((message.to_string(), level));
        }
    }
}
