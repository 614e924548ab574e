//! Explicit process launch options for encoder subprocesses.
//!
//! Every encoder invocation builds its `Command` through these options rather
//! than relying on any process-wide override, so the subprocess never opens a
//! console window on Windows and never inherits the parent's standard streams.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

/// `CREATE_NO_WINDOW` process creation flag.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// `DETACHED_PROCESS` process creation flag.
#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;

/// How a standard stream of the child is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdioMode {
    /// Connected to the null device.
    Null,
    /// Captured through a pipe.
    Piped,
}

impl StdioMode {
    fn to_stdio(self) -> Stdio {
        match self {
            Self::Null => Stdio::null(),
            Self::Piped => Stdio::piped(),
        }
    }
}

/// Options applied to every spawned encoder process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLaunchOptions {
    /// Suppress the console window (Windows only).
    pub hide_window: bool,
    /// Detach from the parent console (Windows only).
    pub detached: bool,
    /// Kill the child if its handle is dropped before it exits.
    pub kill_on_drop: bool,
    pub stdin: StdioMode,
    pub stdout: StdioMode,
    pub stderr: StdioMode,
}

impl Default for ProcessLaunchOptions {
    fn default() -> Self {
        Self {
            hide_window: true,
            detached: true,
            kill_on_drop: true,
            stdin: StdioMode::Null,
            stdout: StdioMode::Null,
            stderr: StdioMode::Piped,
        }
    }
}

impl ProcessLaunchOptions {
    /// Options for short probe commands whose stdout is read.
    pub fn capture_stdout() -> Self {
        Self {
            stdout: StdioMode::Piped,
            ..Default::default()
        }
    }

    /// Windows creation flags implied by these options.
    pub fn creation_flags(&self) -> u32 {
        #[cfg(windows)]
        {
            let mut flags = 0;
            if self.hide_window {
                flags |= CREATE_NO_WINDOW;
            }
            if self.detached {
                flags |= DETACHED_PROCESS;
            }
            flags
        }
        #[cfg(not(windows))]
        {
            0
        }
    }

    /// Applies the options to a command.
    pub fn apply<'a>(&self, command: &'a mut Command) -> &'a mut Command {
        command
            .stdin(self.stdin.to_stdio())
            .stdout(self.stdout.to_stdio())
            .stderr(self.stderr.to_stdio())
            .kill_on_drop(self.kill_on_drop);

        #[cfg(windows)]
        command.creation_flags(self.creation_flags());

        command
    }
}
