//! Best-effort operator notifications.
//!
//! Every alert is logged through `tracing`, fanned out on a broadcast
//! channel, and (when configured) delivered to Telegram in a detached
//! task. Delivery failures never reach trading logic.

mod telegram;

pub use telegram::TelegramClient;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    /// Emoji prefix for outbound messages
    pub fn emoji(&self) -> &'static str {
        match self {
            AlertLevel::Info => "\u{2139}\u{fe0f}",    // info icon
            AlertLevel::Warning => "\u{26a0}\u{fe0f}", // warning icon
            AlertLevel::Error => "\u{274c}",           // red X
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alert payload
#[derive(Debug, Clone)]
pub struct Alert {
    pub level: AlertLevel,
    pub component: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(level: AlertLevel, component: &str, title: &str, message: &str) -> Self {
        Self {
            level,
            component: component.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Format for the messaging sink
    pub fn format_message(&self) -> String {
        format!("{} *{}*\n{}", self.level.emoji(), self.title, self.message)
    }
}

/// Routes alerts to logs, subscribers and the messaging sink
pub struct Notifier {
    telegram: Option<Arc<TelegramClient>>,
    event_tx: broadcast::Sender<Alert>,
}

impl Notifier {
    pub fn new(telegram: Option<Arc<TelegramClient>>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self { telegram, event_tx }
    }

    /// Notifier with no messaging sink (logs and broadcast only)
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Subscribe to alerts as they are emitted
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.event_tx.subscribe()
    }

    /// Emit an alert
    pub fn alert(&self, alert: Alert) {
        match alert.level {
            AlertLevel::Info => info!("[{}] {}: {}", alert.component, alert.title, alert.message),
            AlertLevel::Warning => {
                warn!("[{}] {}: {}", alert.component, alert.title, alert.message)
            }
            AlertLevel::Error => {
                error!("[{}] {}: {}", alert.component, alert.title, alert.message)
            }
        }

        let _ = self.event_tx.send(alert.clone());

        // Fire-and-forget delivery so a slow sink never stalls a
        // supervisor tick or a webhook response.
        if let Some(telegram) = self.telegram.clone() {
            let text = alert.format_message();
            tokio::spawn(async move {
                if let Err(e) = telegram.send_message(&text).await {
                    error!("Failed to send Telegram alert: {}", e);
                }
            });
        }
    }

    pub fn info(&self, component: &str, title: &str, message: &str) {
        self.alert(Alert::new(AlertLevel::Info, component, title, message));
    }

    pub fn warning(&self, component: &str, title: &str, message: &str) {
        self.alert(Alert::new(AlertLevel::Warning, component, title, message));
    }

    pub fn error(&self, component: &str, title: &str, message: &str) {
        self.alert(Alert::new(AlertLevel::Error, component, title, message));
    }
}
