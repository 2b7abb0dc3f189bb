//! Text injection system with testable command execution.
//!
//! Provides two injection mechanisms:
//! - Direct typing: simulates keyboard input via ydotool (wtype fallback)
//! - Clipboard: places the text on the clipboard via wl-copy for manual paste
//!
//! The `CommandExecutor` trait enables full testability without external dependencies.

use crate::error::{DictoggleError, Result};
use std::process::Command;

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use in concurrent contexts.
/// Enables testability by allowing mock implementations.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments.
    ///
    /// Returns the stdout of the command on success.
    /// Returns an error if the command fails or is not found.
    fn execute(&self, command: &str, args: &[&str]) -> Result<String>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(command).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DictoggleError::InjectionToolNotFound {
                    tool: command.to_string(),
                }
            } else if e.kind() == std::io::ErrorKind::PermissionDenied {
                DictoggleError::InjectionPermissionDenied {
                    message: format!(
                        "Permission denied executing {}: {}.\n\
                        Hint: If using ydotool, ensure the ydotoold daemon is running and you have permissions.\n\
                        Try: sudo systemctl start ydotool",
                        command, e
                    ),
                }
            } else {
                DictoggleError::InjectionFailed {
                    message: format!("Failed to execute {}: {}", command, e),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DictoggleError::InjectionFailed {
                message: format!(
                    "{} failed with status {:?}: {}",
                    command, output.status, stderr
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Text injector that uses CommandExecutor for system interaction.
pub struct TextInjector<E: CommandExecutor> {
    executor: E,
    typing_delay_ms: u32,
}

impl<E: CommandExecutor> TextInjector<E> {
    /// Create a new TextInjector with the given executor.
    pub fn new(executor: E, typing_delay_ms: u32) -> Self {
        Self {
            executor,
            typing_delay_ms,
        }
    }

    /// Inject text directly by simulating keyboard input at the focused window.
    ///
    /// Tries ydotool first (works on Wayland with the ydotoold daemon), then
    /// wtype (no daemon needed, Wayland compositors with virtual-keyboard
    /// support).
    pub fn inject_direct(&self, text: &str) -> Result<()> {
        let delay = self.typing_delay_ms.to_string();
        let ydotool = self
            .executor
            .execute("ydotool", &["type", "--key-delay", &delay, "--", text]);

        match ydotool {
            Ok(_) => Ok(()),
            Err(DictoggleError::InjectionToolNotFound { .. }) => {
                self.executor
                    .execute("wtype", &[text])
                    .map_err(|e| match &e {
                        DictoggleError::InjectionToolNotFound { .. } => {
                            DictoggleError::InjectionFailed {
                                message: "No typing tool found. Install one of:\n\
                                    ydotool: sudo apt install ydotool (then: sudo systemctl enable --now ydotool)\n\
                                    wtype:   sudo apt install wtype"
                                    .to_string(),
                            }
                        }
                        _ => e,
                    })?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Place text on the clipboard (fallback when direct typing fails).
    ///
    /// The caller is responsible for telling the user to paste manually.
    pub fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        self.executor
            .execute("wl-copy", &["--", text])
            .map_err(|e| match &e {
                DictoggleError::InjectionToolNotFound { tool } if tool == "wl-copy" => {
                    DictoggleError::InjectionFailed {
                        message: "wl-copy not found. Install wl-clipboard:\n\
                            Ubuntu/Debian: sudo apt install wl-clipboard\n\
                            Arch: sudo pacman -S wl-clipboard"
                            .to_string(),
                    }
                }
                _ => e,
            })?;
        Ok(())
    }
}

impl TextInjector<SystemCommandExecutor> {
    /// Create a TextInjector with the system command executor.
    pub fn system(typing_delay_ms: u32) -> Self {
        Self::new(SystemCommandExecutor::new(), typing_delay_ms)
    }
}
