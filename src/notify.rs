//! Desktop notifications for the hotkey (headless) use-case.
//!
//! Notifications are fire-and-forget: the hotkey user has no terminal, so
//! state transitions are surfaced via `notify-send`, but a missing or broken
//! notification tool must never abort the dictation workflow.

use crate::config::NotifyConfig;
use crate::inject::injector::{CommandExecutor, SystemCommandExecutor};

/// Notification urgency, mapped to the tool's `-u` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Critical,
}

impl Urgency {
    fn as_arg(self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

/// Fire-and-forget desktop notifier.
pub struct Notifier<E: CommandExecutor> {
    executor: E,
    tool: String,
    enabled: bool,
}

impl<E: CommandExecutor> Notifier<E> {
    /// Create a notifier with the given executor.
    pub fn new(executor: E, tool: &str, enabled: bool) -> Self {
        Self {
            executor,
            tool: tool.to_string(),
            enabled,
        }
    }

    /// Send a normal-urgency notification.
    pub fn info(&self, summary: &str, body: &str) {
        self.send(summary, body, Urgency::Normal);
    }

    /// Send a critical-urgency notification.
    pub fn error(&self, summary: &str, body: &str) {
        self.send(summary, body, Urgency::Critical);
    }

    fn send(&self, summary: &str, body: &str, urgency: Urgency) {
        if !self.enabled {
            return;
        }

        // Failures are intentionally dropped: notifications are best-effort.
        let _ = self
            .executor
            .execute(&self.tool, &["-u", urgency.as_arg(), summary, body]);
    }
}

impl Notifier<SystemCommandExecutor> {
    /// Create a notifier from configuration, using the system executor.
    pub fn from_config(config: &NotifyConfig, quiet: bool) -> Self {
        Self::new(
            SystemCommandExecutor::new(),
            &config.tool,
            config.enable && !quiet,
        )
    }
}
