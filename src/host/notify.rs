//! Notification collaborator: operator-visible messages and screen refresh

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Non-blocking message surface; implementations must not wait for the operator
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotificationLevel, message: &str);

    /// Ask the host to reload the screen the workflow was started from
    fn refresh_screen(&self);
}

/// Prints notifications to stdout and mirrors them into the log
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    refreshes: AtomicU64,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Info => {
                info!(%message, "operator notification");
                println!("ℹ️  {message}");
            }
            NotificationLevel::Success => {
                info!(%message, "operator notification");
                println!("✅ {message}");
            }
            NotificationLevel::Warning => {
                warn!(%message, "operator notification");
                println!("⚠️  {message}");
            }
            NotificationLevel::Error => {
                error!(%message, "operator notification");
                println!("❌ {message}");
            }
        }
    }

    fn refresh_screen(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        info!("host screen refresh requested");
    }
}
