//! Cancellable delayed tasks.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;

/// Runs an action once after a delay unless cancelled first.
///
/// Dropping the handle cancels the task. Cancellation only covers the waiting
/// phase: once the delay has elapsed the action runs to completion.
#[derive(Debug)]
pub struct DelayedTask {
    cancel: Option<oneshot::Sender<()>>,
}

impl DelayedTask {
    pub fn spawn<F>(delay: Duration, action: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (cancel, cancelled) = oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => action.await,
                _ = cancelled => {}
            }
        });
        Self {
            cancel: Some(cancel),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
