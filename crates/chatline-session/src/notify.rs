//! User-facing notifications.
//!
//! The coordinator reports the outcome of every operation through a
//! [`Notifier`]. In a GUI that would be a toast; in a CLI, a line on
//! stderr. Notifying is fire-and-forget and can't fail.

use std::sync::Arc;

/// Receives success and failure messages meant for the user.
pub trait Notifier: Send + Sync + 'static {
    fn notify_success(&self, message: &str);
    fn notify_failure(&self, message: &str);
}

/// Lets a caller keep one `Arc` to a notifier and hand a clone to the
/// coordinator.
impl<N: Notifier> Notifier for Arc<N> {
    fn notify_success(&self, message: &str) {
        (**self).notify_success(message);
    }

    fn notify_failure(&self, message: &str) {
        (**self).notify_failure(message);
    }
}

/// A [`Notifier`] that writes notifications to the `tracing` log under the
/// `chatline::notify` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_success(&self, message: &str) {
        tracing::info!(target: "chatline::notify", "{message}");
    }

    fn notify_failure(&self, message: &str) {
        tracing::warn!(target: "chatline::notify", "{message}");
    }
}
