pub mod command;

use arboard::Clipboard as Arboard;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::{config::ClipboardConfig, Result, SpacedError};

pub use command::CommandClipboard;

/// Something that can replace the system clipboard contents.
#[async_trait]
pub trait ClipboardSink: Send + Sync {
    /// Opens a write session for one payload.
    async fn open(&self) -> Result<Box<dyn ClipboardSession>>;
}

/// A single clipboard write.
///
/// Callers write, then `close` to signal end of input, then `wait` for the sink to
/// finish. `close` and `wait` must still be called after a failed `write`.
#[async_trait]
pub trait ClipboardSession: Send {
    async fn write(&mut self, text: &str) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
    async fn wait(&mut self) -> Result<()>;
}

/// Picks the external command when one is configured, the native clipboard otherwise.
pub fn from_config(config: &ClipboardConfig) -> Result<Arc<dyn ClipboardSink>> {
    match config.command.as_deref().map(str::trim) {
        Some(program) if !program.is_empty() => Ok(Arc::new(CommandClipboard::new(
            program,
            config.args.clone(),
        ))),
        _ => Ok(Arc::new(NativeClipboard::new()?)),
    }
}

/// Clipboard access through the platform API.
pub struct NativeClipboard {
    clipboard: Arc<Mutex<Arboard>>,
}

impl NativeClipboard {
    pub fn new() -> Result<Self> {
        let clipboard = Arboard::new().map_err(|e| SpacedError::Clipboard(e.to_string()))?;

        Ok(Self {
            clipboard: Arc::new(Mutex::new(clipboard)),
        })
    }
}

#[async_trait]
impl ClipboardSink for NativeClipboard {
    async fn open(&self) -> Result<Box<dyn ClipboardSession>> {
        Ok(Box::new(NativeSession {
            clipboard: self.clipboard.clone(),
            buffer: String::new(),
            closed: false,
        }))
    }
}

struct NativeSession {
    clipboard: Arc<Mutex<Arboard>>,
    buffer: String,
    closed: bool,
}

#[async_trait]
impl ClipboardSession for NativeSession {
    async fn write(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(SpacedError::Clipboard("session already closed".to_string()));
        }
        self.buffer.push_str(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut clipboard = self
            .clipboard
            .lock()
            .map_err(|e| SpacedError::Clipboard(format!("Lock error: {e}")))?;

        clipboard
            .set_text(std::mem::take(&mut self.buffer))
            .map_err(|e| SpacedError::Clipboard(e.to_string()))
    }

    // set_text is synchronous, nothing left to wait for
    async fn wait(&mut self) -> Result<()> {
        Ok(())
    }
}
