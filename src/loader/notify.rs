//! User-visible transient notifications.

use tracing::warn;

/// Best-effort, non-blocking message to the user. Always invoked on the UI
/// context, and only while the slot's surface is alive.
pub trait Notifier: Send + Sync {
    fn display(&self, message: &str);
}

/// Notifier for headless use: messages go to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn display(&self, message: &str) {
        warn!(target: "image_tier_cache::notice", "{}", message);
    }
}
