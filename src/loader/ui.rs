//! UI-affinity executor.
//!
//! Display surfaces belong to one context. Background work never touches a
//! surface directly; it posts a closure through a [`UiHandle`] and the owner
//! of the matching [`UiLoop`] runs it.

use tokio::sync::mpsc;
use tracing::debug;

type UiTask = Box<dyn FnOnce() + Send>;

/// Creates a connected handle/loop pair.
pub fn ui_channel() -> (UiHandle, UiLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiHandle { tx }, UiLoop { rx })
}

/// Posts work onto the UI context. Cheap to clone.
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiTask>,
}

impl UiHandle {
    /// Queues `task`. Dropped silently if the loop is gone.
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(task)).is_err() {
            debug!("UI loop closed, dropping task");
        }
    }
}

/// Runs posted work on whichever context owns it.
pub struct UiLoop {
    rx: mpsc::UnboundedReceiver<UiTask>,
}

impl UiLoop {
    /// Runs everything queued so far without waiting. Returns the count.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            count += 1;
        }
        count
    }

    /// Runs tasks until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(task) = self.rx.recv().await {
            task();
        }
        debug!("UI loop finished");
    }
}
