//! In-memory `NoteStore` with failure injection, used by tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, Mutex, Semaphore};

use crate::auth::AuthUser;
use crate::models::{Note, NoteId, NotePatch, NotesFilter};
use crate::{Error, Result};

use super::NoteStore;

/// Which remote operation an injected failure applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Insert,
    Update,
    Delete,
}

#[derive(Default)]
struct MemoryState {
    notes: Vec<Note>,
    last_stamp: Option<DateTime<Utc>>,
    failures: VecDeque<Operation>,
    updates: Vec<(NoteId, NotePatch)>,
}

impl MemoryState {
    /// Strictly increasing timestamps so ordering never depends on clock resolution.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn take_failure(&mut self, operation: Operation) -> Result<()> {
        if let Some(position) = self.failures.iter().position(|op| *op == operation) {
            self.failures.remove(position);
            return Err(Error::Api {
                status: 503,
                message: format!("injected {operation:?} failure"),
            });
        }
        Ok(())
    }
}

/// A single-owner note collection kept in memory.
#[derive(Clone)]
pub struct MemoryNoteStore {
    owner: AuthUser,
    state: Arc<Mutex<MemoryState>>,
    gates: Arc<Mutex<HashMap<Operation, Arc<Semaphore>>>>,
    calls: Arc<watch::Sender<HashMap<Operation, usize>>>,
}

impl MemoryNoteStore {
    pub fn new(owner_id: impl Into<String>) -> Self {
        let (calls, _) = watch::channel(HashMap::new());
        Self {
            owner: AuthUser {
                id: owner_id.into(),
                email: None,
            },
            state: Arc::new(Mutex::new(MemoryState::default())),
            gates: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(calls),
        }
    }

    /// Seed a note directly, bypassing failure injection.
    pub async fn seed(&self, title: &str, content: &str, starred: bool) -> Note {
        let mut state = self.state.lock().await;
        let stamp = state.stamp();
        let note = Note {
            id: NoteId::new(),
            user_id: self.owner.id.clone(),
            title: title.to_string(),
            content: content.to_string(),
            starred,
            updated_at: stamp,
            created_at: stamp,
        };
        state.notes.push(note.clone());
        note
    }

    /// Make the next call of `operation` fail once.
    pub async fn fail_next(&self, operation: Operation) {
        self.state.lock().await.failures.push_back(operation);
    }

    /// Hold every subsequent call of `operation` in flight until released.
    pub async fn hold(&self, operation: Operation) {
        self.gates
            .lock()
            .await
            .insert(operation, Arc::new(Semaphore::new(0)));
    }

    /// Let `count` held calls of `operation` proceed.
    pub async fn release(&self, operation: Operation, count: usize) {
        if let Some(gate) = self.gates.lock().await.get(&operation) {
            gate.add_permits(count);
        }
    }

    /// Wait until `operation` has been called at least `count` times.
    pub async fn wait_for_calls(&self, operation: Operation, count: usize) {
        let mut calls = self.calls.subscribe();
        let _ = calls
            .wait_for(|calls| calls.get(&operation).copied().unwrap_or(0) >= count)
            .await;
    }

    /// Number of times `operation` has been called
    pub fn calls(&self, operation: Operation) -> usize {
        self.calls.borrow().get(&operation).copied().unwrap_or(0)
    }

    /// Count the call, then wait at the gate if the operation is held.
    async fn enter(&self, operation: Operation) {
        self.calls
            .send_modify(|calls| *calls.entry(operation).or_insert(0) += 1);
        let gate = self.gates.lock().await.get(&operation).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }

    /// Every update received so far, in arrival order
    pub async fn updates(&self) -> Vec<(NoteId, NotePatch)> {
        self.state.lock().await.updates.clone()
    }

    pub async fn get(&self, id: &NoteId) -> Option<Note> {
        self.state
            .lock()
            .await
            .notes
            .iter()
            .find(|note| note.id == *id)
            .cloned()
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn list_notes(
        &self,
        filter: &NotesFilter,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Note>> {
        self.enter(Operation::List).await;
        let mut state = self.state.lock().await;
        state.take_failure(Operation::List)?;

        let mut matching = state
            .notes
            .iter()
            .filter(|note| note.matches(filter))
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matching
            .into_iter()
            .skip(page * page_size)
            .take(page_size)
            .collect())
    }

    async fn current_identity(&self) -> Result<AuthUser> {
        Ok(self.owner.clone())
    }

    async fn insert_note(&self, owner: &AuthUser) -> Result<Note> {
        self.enter(Operation::Insert).await;
        let mut state = self.state.lock().await;
        state.take_failure(Operation::Insert)?;
        let stamp = state.stamp();
        let note = Note {
            id: NoteId::new(),
            user_id: owner.id.clone(),
            title: String::new(),
            content: String::new(),
            starred: false,
            updated_at: stamp,
            created_at: stamp,
        };
        state.notes.push(note.clone());
        Ok(note)
    }

    async fn update_note(&self, id: &NoteId, patch: &NotePatch) -> Result<Note> {
        self.state
            .lock()
            .await
            .updates
            .push((*id, patch.clone()));
        self.enter(Operation::Update).await;

        let mut state = self.state.lock().await;
        state.take_failure(Operation::Update)?;
        let stamp = state.stamp();
        let note = state
            .notes
            .iter_mut()
            .find(|note| note.id == *id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        patch.apply_to(note);
        note.updated_at = stamp;
        Ok(note.clone())
    }

    async fn delete_note(&self, id: &NoteId) -> Result<()> {
        self.enter(Operation::Delete).await;
        let mut state = self.state.lock().await;
        state.take_failure(Operation::Delete)?;
        state.notes.retain(|note| note.id != *id);
        Ok(())
    }
}
