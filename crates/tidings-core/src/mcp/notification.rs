//! Notification handler traits and implementations

use serde_json::Value;
use tracing::debug;

/// Receives notifications the provider sends outside of any call
/// (log messages, progress, list-changed events).
///
/// Called from the bridge's receiver task, so implementations must return
/// quickly.
pub trait NotificationHandler: Send + Sync {
    /// Handle a notification
    fn handle(&self, method: &str, params: Option<Value>);
}

/// Default notification handler that logs notifications
pub struct LoggingNotificationHandler;

impl NotificationHandler for LoggingNotificationHandler {
    fn handle(&self, method: &str, params: Option<Value>) {
        debug!("provider notification: {} {:?}", method, params);
    }
}

impl<F> NotificationHandler for F
where
    F: Fn(&str, Option<Value>) + Send + Sync,
{
    fn handle(&self, method: &str, params: Option<Value>) {
        self(method, params)
    }
}
