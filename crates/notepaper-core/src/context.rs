//! Application context: the backend clients and the shared session.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::{AuthSession, SessionPersistence, SignUpOutcome, SupabaseAuthClient};
use crate::config::ClientConfig;
use crate::notify::SharedNotifier;
use crate::session::SessionState;
use crate::store::SupabaseNoteStore;
use crate::workspace::NotesWorkspace;
use crate::Result;

/// Owns the auth client, the note store, and the session every component
/// observes. Built once at startup and torn down on sign-out.
pub struct AppContext<P: SessionPersistence> {
    config: ClientConfig,
    auth: SupabaseAuthClient<P>,
    session: watch::Sender<SessionState>,
    store: Arc<SupabaseNoteStore>,
    notifier: SharedNotifier,
}

impl<P: SessionPersistence> AppContext<P> {
    /// Build the clients. The session starts out loading until
    /// [`restore_session`](Self::restore_session) runs.
    pub fn init(config: ClientConfig, persistence: P, notifier: SharedNotifier) -> Result<Self> {
        let (session, receiver) = watch::channel(SessionState::loading());
        let auth = SupabaseAuthClient::new(&config, persistence)?;
        let store = Arc::new(SupabaseNoteStore::new(&config, receiver)?);
        tracing::debug!("Initialized backend clients for {}", config.supabase_url);
        Ok(Self {
            config,
            auth,
            session,
            store,
            notifier,
        })
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub const fn auth(&self) -> &SupabaseAuthClient<P> {
        &self.auth
    }

    pub fn session_state(&self) -> SessionState {
        self.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    /// Load the persisted session and publish the result.
    ///
    /// A failure still publishes "no session" so guards stop waiting.
    pub async fn restore_session(&self) -> Result<Option<AuthSession>> {
        match self.auth.restore_session().await {
            Ok(session) => {
                self.publish(session.clone());
                Ok(session)
            }
            Err(error) => {
                self.publish(None);
                Err(error.into())
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let session = self.auth.sign_in(email, password).await?;
        self.publish(Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let outcome = self.auth.sign_up(email, password).await?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.publish(Some(session.clone()));
        }
        Ok(outcome)
    }

    /// Sign out remotely when possible, forget the session locally, and
    /// publish "no session".
    pub async fn teardown(&self) -> Result<()> {
        let current = self.session.borrow().session.clone();
        if let Some(session) = current {
            if let Err(error) = self.auth.sign_out(&session.access_token).await {
                tracing::warn!("Remote sign-out failed; clearing local session: {}", error);
                self.auth.forget_session()?;
            }
        } else {
            self.auth.forget_session()?;
        }
        self.publish(None);
        Ok(())
    }

    /// A notes workspace bound to this context's store and notifier.
    pub fn workspace(&self) -> NotesWorkspace {
        NotesWorkspace::new(self.store.clone(), Arc::clone(&self.notifier))
    }

    fn publish(&self, session: Option<AuthSession>) {
        let state = session.map_or_else(SessionState::signed_out, SessionState::signed_in);
        self.session.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{test_session, MemorySessionStore};
    use crate::notify::RecordingNotifier;
    use crate::Error;

    fn context(persistence: MemorySessionStore) -> AppContext<MemorySessionStore> {
        let config = ClientConfig::new("http://127.0.0.1:9", "anon-key").unwrap();
        AppContext::init(config, persistence, Arc::new(RecordingNotifier::default())).unwrap()
    }

    #[tokio::test]
    async fn session_starts_loading() {
        let context = context(MemorySessionStore::default());
        assert!(context.session_state().loading);
    }

    #[tokio::test]
    async fn restore_publishes_persisted_session() {
        let persistence = MemorySessionStore::default();
        let session = test_session("user-1");
        persistence.save_session(&session).unwrap();
        let context = context(persistence);
        let mut receiver = context.subscribe();

        let restored = context.restore_session().await.unwrap();
        assert_eq!(restored, Some(session.clone()));
        assert!(receiver.has_changed().unwrap());
        assert_eq!(
            *receiver.borrow_and_update(),
            SessionState::signed_in(session)
        );
    }

    #[tokio::test]
    async fn restore_without_session_publishes_signed_out() {
        let context = context(MemorySessionStore::default());
        assert_eq!(context.restore_session().await.unwrap(), None);
        assert_eq!(context.session_state(), SessionState::signed_out());
    }

    #[tokio::test]
    async fn teardown_without_session_clears_persistence() {
        let persistence = MemorySessionStore::default();
        let context = context(persistence.clone());
        context.restore_session().await.unwrap();
        persistence.save_session(&test_session("stale")).unwrap();

        context.teardown().await.unwrap();
        assert_eq!(persistence.load_session().unwrap(), None);
        assert_eq!(context.session_state(), SessionState::signed_out());
    }

    #[tokio::test]
    async fn workspace_without_session_is_unauthenticated() {
        let context = context(MemorySessionStore::default());
        context.restore_session().await.unwrap();

        let result = context.workspace().open().await;
        assert!(matches!(result, Err(Error::Unauthenticated)));
    }
}
