use std::collections::VecDeque;
use std::sync::Mutex;

use pm_core::{Notification, NotificationVariant};
use thiserror::Error;

const FEED_CAPACITY: usize = 50;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification feed is unavailable")]
    Unavailable,
}

/// Fire-and-forget sink for user-facing messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log and nowhere else.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        log_notification(&notification);
        Ok(())
    }
}

/// Keeps the most recent notifications for the dashboard to render as toasts.
#[derive(Debug, Default)]
pub struct NotificationFeed {
    recent: Mutex<VecDeque<Notification>>,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<Notification> {
        self.recent
            .lock()
            .map(|recent| recent.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Notifier for NotificationFeed {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        log_notification(&notification);

        let mut recent = self.recent.lock().map_err(|_| NotifyError::Unavailable)?;
        if recent.len() == FEED_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(notification);
        Ok(())
    }
}

fn log_notification(notification: &Notification) {
    match notification.variant {
        NotificationVariant::Default => tracing::info!(
            title = %notification.title,
            "{}", notification.description
        ),
        NotificationVariant::Destructive => tracing::warn!(
            title = %notification.title,
            "{}", notification.description
        ),
    }
}
