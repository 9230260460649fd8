//! Handle to a running sync session.

use chat_sync_core::Event;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::connectivity::ObserverHandle;
use crate::error::SessionError;

/// Owns a controller running on a tokio task.
///
/// Dropping the handle tears the session down in the background: the
/// connectivity observer is unregistered and the controller closes its
/// subscription. Use [`SessionHandle::shutdown`] to wait for that.
#[derive(Debug)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<Event>,
    task: Option<JoinHandle<()>>,
    observer: ObserverHandle,
}

impl SessionHandle {
    pub(crate) fn new(
        events: mpsc::UnboundedSender<Event>,
        task: JoinHandle<()>,
        observer: ObserverHandle,
    ) -> Self {
        Self {
            events,
            task: Some(task),
            observer,
        }
    }

    /// True once the controller task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Tear down and wait for the controller task to stop.
    pub async fn shutdown(mut self) -> Result<(), SessionError> {
        self.stop();
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| SessionError::TaskFailed(e.to_string())),
            None => Ok(()),
        }
    }

    fn stop(&mut self) {
        self.observer.cancel();
        if self.events.send(Event::Teardown).is_ok() {
            debug!("sync session teardown requested");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
