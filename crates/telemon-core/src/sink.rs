//! Render sinks.
//!
//! Presenting a frame is split in two. [`RenderSink::capture`] copies what
//! the sink needs out of a freshly rendered manager while the manager is
//! locked; [`RenderSink::present`] writes that copy out after the lock is
//! released, so slow terminals and viewers never hold up dispatch.

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::CoreError;
use crate::manager::Manager;

/// Buffered frames for remote viewers that fall behind.
pub const REMOTE_CHANNEL_CAPACITY: usize = 16;

pub trait RenderSink: Send {
    /// Owned snapshot of one render pass.
    type Frame: Send;

    /// Snapshot the manager's last render. `None` skips this pass.
    fn capture(&self, manager: &Manager) -> Option<Self::Frame>;

    fn present(&mut self, frame: Self::Frame) -> Result<(), CoreError>;
}

// ── Terminal ─────────────────────────────────────────────────────────

/// Clears the screen and redraws the whole frame from the top-left.
#[derive(Debug)]
pub struct TerminalSink<W: Write + Send> {
    out: W,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RenderSink for TerminalSink<W> {
    type Frame = Vec<String>;

    fn capture(&self, manager: &Manager) -> Option<Vec<String>> {
        Some(
            manager
                .buffer()
                .iter()
                .filter(|entry| !entry.is_empty())
                .cloned()
                .collect(),
        )
    }

    fn present(&mut self, frame: Vec<String>) -> Result<(), CoreError> {
        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        for entry in &frame {
            self.out.write_all(entry.as_bytes())?;
            self.out.write_all(b"\n")?;
        }
        self.out.flush()?;
        Ok(())
    }
}

// ── Remote ───────────────────────────────────────────────────────────

/// Publishes `{id: rendered_text}` as JSON on a broadcast channel.
#[derive(Debug, Clone)]
pub struct RemoteSink {
    tx: broadcast::Sender<String>,
}

impl Default for RemoteSink {
    fn default() -> Self {
        Self::new(REMOTE_CHANNEL_CAPACITY)
    }
}

impl RemoteSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn viewers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl RenderSink for RemoteSink {
    type Frame = serde_json::Map<String, serde_json::Value>;

    fn capture(&self, manager: &Manager) -> Option<Self::Frame> {
        (self.tx.receiver_count() > 0).then(|| manager.flatten())
    }

    fn present(&mut self, frame: Self::Frame) -> Result<(), CoreError> {
        let payload = serde_json::to_string(&frame)
            .map_err(|e| CoreError::Internal(format!("cannot encode frame: {e}")))?;
        // Viewers may disconnect between the count check and the send.
        if self.tx.send(payload).is_err() {
            trace!("no remote viewers");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::element::TextElementConfig;
    use crate::template::{ElementTemplate, WidgetSpec};
    use telemon_ingest::Value;

    fn show<S: RenderSink>(sink: &mut S, manager: &Manager) {
        if let Some(frame) = sink.capture(manager) {
            sink.present(frame).unwrap();
        }
    }

    fn manager() -> Manager {
        let mut manager = Manager::new();
        manager
            .add_template(&ElementTemplate::new(
                "status",
                WidgetSpec::Text(TextElementConfig::default()),
            ))
            .unwrap();
        manager.update("status", &[Value::from("running")]).unwrap();
        manager.render();
        manager
    }

    #[test]
    fn terminal_sink_clears_then_draws() {
        let mut sink = TerminalSink::new(Vec::new());
        show(&mut sink, &manager());
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.starts_with("\x1b[2J"));
        assert!(out.ends_with("running\n"));
    }

    #[test]
    fn remote_sink_publishes_flattened_json() {
        let mut sink = RemoteSink::default();
        let mut rx = sink.subscribe();
        show(&mut sink, &manager());
        let payload = rx.try_recv().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["status"], "running");
    }

    #[test]
    fn remote_sink_without_viewers_is_quiet() {
        let sink = RemoteSink::default();
        assert_eq!(sink.viewers(), 0);
        assert!(sink.capture(&manager()).is_none());
    }
}
