use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::debug;

use super::{ClipboardSession, ClipboardSink};
use crate::{Result, SpacedError};

/// Pipes the payload into a clipboard utility such as `pbcopy`, `wl-copy` or
/// `xclip -selection clipboard`.
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl ClipboardSink for CommandClipboard {
    async fn open(&self) -> Result<Box<dyn ClipboardSession>> {
        debug!("Spawning clipboard command: {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SpacedError::Clipboard(format!("error running {}: {e}", self.program))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SpacedError::Clipboard("clipboard stdin unavailable".to_string()))?;

        Ok(Box::new(CommandSession {
            program: self.program.clone(),
            child,
            stdin: Some(stdin),
        }))
    }
}

struct CommandSession {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
}

#[async_trait]
impl ClipboardSession for CommandSession {
    async fn write(&mut self, text: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SpacedError::Clipboard("clipboard already closed".to_string()))?;

        stdin.write_all(text.as_bytes()).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.stdin.take() {
            // dropping stdin delivers EOF
            Some(mut stdin) => Ok(stdin.shutdown().await?),
            None => Ok(()),
        }
    }

    async fn wait(&mut self) -> Result<()> {
        // the child never exits while its stdin is open
        self.stdin.take();

        let status = self.child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(SpacedError::Clipboard(format!(
                "{} exited with {status}",
                self.program
            )))
        }
    }
}
