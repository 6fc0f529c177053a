//! User-visible failure notifications.

use log::error;

/// Alert raised when a freshly printed note could not be saved.
pub const CREATE_FAILED_ALERT: &str =
    "Failed to save the note. Please check the network connection.";

/// Receives blocking, user-facing failure messages (alert-style).
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Notifier that only records alerts in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        error!("event=user_alert module=board status=error message={message}");
    }
}
