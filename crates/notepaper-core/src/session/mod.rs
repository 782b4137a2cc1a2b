//! Shared session value and the guard that gates note access on it.

use tokio::sync::watch;

use crate::auth::AuthSession;

/// The session value every component observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// The persisted session is still being restored
    pub loading: bool,
    pub session: Option<AuthSession>,
}

impl SessionState {
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            loading: true,
            session: None,
        }
    }

    #[must_use]
    pub const fn signed_out() -> Self {
        Self {
            loading: false,
            session: None,
        }
    }

    #[must_use]
    pub const fn signed_in(session: AuthSession) -> Self {
        Self {
            loading: false,
            session: Some(session),
        }
    }
}

/// Sends the user to the sign-in boundary.
pub trait Navigator: Send + Sync {
    fn redirect_to_sign_in(&self);
}

impl<F: Fn() + Send + Sync> Navigator for F {
    fn redirect_to_sign_in(&self) {
        self();
    }
}

/// What the guarded surface should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardView {
    /// Neutral placeholder; no note data may be shown
    Placeholder,
    /// Authenticated; render the guarded content for this session
    Render(AuthSession),
}

/// Gates access on the shared session.
///
/// Navigation fires at most once per transition into the signed-out state; it
/// re-arms when a session appears again.
pub struct SessionGuard<N: Navigator> {
    navigator: N,
    redirected: bool,
}

impl<N: Navigator> SessionGuard<N> {
    pub const fn new(navigator: N) -> Self {
        Self {
            navigator,
            redirected: false,
        }
    }

    pub fn observe(&mut self, state: &SessionState) -> GuardView {
        if state.loading {
            return GuardView::Placeholder;
        }

        match &state.session {
            Some(session) => {
                self.redirected = false;
                GuardView::Render(session.clone())
            }
            None => {
                if !self.redirected {
                    self.redirected = true;
                    tracing::debug!("No session; redirecting to sign-in");
                    self.navigator.redirect_to_sign_in();
                }
                GuardView::Placeholder
            }
        }
    }

    /// Follow the session channel until its sender is dropped.
    pub async fn run(
        mut self,
        mut session: watch::Receiver<SessionState>,
        mut on_view: impl FnMut(GuardView),
    ) {
        loop {
            let state = session.borrow_and_update().clone();
            on_view(self.observe(&state));
            if session.changed().await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::auth::test_session;

    fn counting_guard() -> (SessionGuard<impl Navigator>, Arc<AtomicUsize>) {
        let redirects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&redirects);
        let guard = SessionGuard::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (guard, redirects)
    }

    #[test]
    fn loading_shows_placeholder_without_navigation() {
        let (mut guard, redirects) = counting_guard();
        assert_eq!(guard.observe(&SessionState::loading()), GuardView::Placeholder);
        assert_eq!(redirects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_session_redirects_once() {
        let (mut guard, redirects) = counting_guard();
        for _ in 0..3 {
            assert_eq!(
                guard.observe(&SessionState::signed_out()),
                GuardView::Placeholder
            );
        }
        assert_eq!(redirects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn session_renders_and_rearms_redirect() {
        let (mut guard, redirects) = counting_guard();
        guard.observe(&SessionState::signed_out());

        let session = test_session("u1");
        assert_eq!(
            guard.observe(&SessionState::signed_in(session.clone())),
            GuardView::Render(session)
        );

        guard.observe(&SessionState::signed_out());
        assert_eq!(redirects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn run_follows_channel_until_closed() {
        let (guard, redirects) = counting_guard();
        let (tx, rx) = watch::channel(SessionState::loading());
        let views = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&views);

        let task = tokio::spawn(guard.run(rx, move |view| {
            sink.lock().unwrap().push(view);
        }));

        tokio::task::yield_now().await;
        tx.send_replace(SessionState::signed_in(test_session("u1")));
        tokio::task::yield_now().await;
        tx.send_replace(SessionState::signed_out());
        tokio::task::yield_now().await;
        drop(tx);
        task.await.unwrap();

        let views = views.lock().unwrap();
        assert_eq!(views.first(), Some(&GuardView::Placeholder));
        assert!(views
            .iter()
            .any(|view| matches!(view, GuardView::Render(session) if session.user.id == "u1")));
        assert_eq!(views.last(), Some(&GuardView::Placeholder));
        assert_eq!(redirects.load(Ordering::SeqCst), 1);
    }
}
