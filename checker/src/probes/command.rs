//! External command execution bound to the run deadline

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

pub enum CommandOutcome {
    Finished(Output),
    /// Deadline reached; the child was killed
    TimedOut,
    SpawnFailed(io::Error),
}

/// Find a binary on `PATH`
pub fn locate(binary: &str) -> Option<PathBuf> {
    which::which(binary).ok()
}

/// Run a command to completion, killing it if the deadline passes first
pub async fn run_until(program: &Path, args: &[String], deadline: Instant) -> CommandOutcome {
    debug!("exec {:?} {}", program, args.join(" "));
    
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
    
    match tokio::time::timeout_at(deadline, cmd.output()).await {
        Ok(Ok(output)) => CommandOutcome::Finished(output),
        Ok(Err(e)) => CommandOutcome::SpawnFailed(e),
        Err(_) => CommandOutcome::TimedOut,
    }
}

/// stdout followed by stderr, lossily decoded
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}
