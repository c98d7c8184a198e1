//! Chart viewer supervision.
//!
//! The viewer is a separate long-running process that only reads persisted
//! history. `ViewerHandle` owns the child it spawned; restarting terminates
//! exactly that child.

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// A running chart viewer process.
#[derive(Debug)]
pub struct ViewerHandle {
    command: Vec<String>,
    child: Option<Child>,
}

impl ViewerHandle {
    /// Spawn the viewer. `command[0]` is the executable.
    pub fn spawn(command: &[String]) -> Result<Self> {
        let child = launch(command)?;
        Ok(Self {
            command: command.to_vec(),
            child: Some(child),
        })
    }

    /// OS process id of the owned child, if still owned.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Whether the owned child is still alive.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Terminate the owned child and spawn a fresh one.
    pub async fn restart(&mut self) -> Result<()> {
        let old = self.id();
        self.stop().await?;
        self.child = Some(launch(&self.command)?);
        info!(
            event = "viewer.restarted",
            old_pid = ?old,
            pid = ?self.id(),
        );
        Ok(())
    }

    /// Terminate the owned child and wait for it to exit.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if child.try_wait()?.is_none() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to terminate chart viewer");
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Give up ownership, leaving the viewer running after this process exits.
    pub fn detach(mut self) -> Option<u32> {
        let pid = self.id();
        self.child.take();
        pid
    }
}

fn launch(command: &[String]) -> Result<Child> {
    let Some((exe, args)) = command.split_first() else {
        bail!("Chart viewer command is empty");
    };
    let child = Command::new(exe)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to launch chart viewer '{}'", exe))?;
    info!(event = "viewer.started", command = %exe, pid = ?child.id());
    Ok(child)
}
