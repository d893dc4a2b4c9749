// ABOUTME: Runs a compiled mount command.
// ABOUTME: Failures surface the program's own output, untouched apart from trailing whitespace.

use std::process::Command;

use tracing::debug;

use crate::command::MountCommand;
use crate::error::{MountError, Result};

pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &MountCommand) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &MountCommand) -> Result<()> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .output()
            .map_err(|source| MountError::Io {
                action: "run",
                path: command.program.clone().into(),
                source,
            })?;

        if output.status.success() {
            debug!(program = %command.program, "mount command succeeded");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = match (stderr.trim_end(), stdout.trim_end()) {
            ("", "") => format!("{} failed: {}", command.program, output.status),
            ("", out) => out.to_string(),
            (err, _) => err.to_string(),
        };
        Err(MountError::Execution(message))
    }
}
