//! Character-by-character text reveal.
//!
//! Each reveal runs as its own tokio task and publishes progress through a
//! watch channel. Starting a reveal aborts the one in flight, and every frame
//! carries an epoch so a late write from an aborted task is ignored.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Progress of the current reveal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealFrame {
    /// Incremented by every `start`
    pub epoch: u64,
    pub visible: String,
    pub total_chars: usize,
    pub complete: bool,
}

impl RevealFrame {
    pub fn visible_chars(&self) -> usize {
        self.visible.chars().count()
    }
}

/// Handle to a cancellable reveal target
pub struct TextReveal {
    frame_tx: Arc<watch::Sender<RevealFrame>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TextReveal {
    pub fn new() -> Self {
        let (frame_tx, _) = watch::channel(RevealFrame {
            complete: true,
            ..RevealFrame::default()
        });
        Self {
            frame_tx: Arc::new(frame_tx),
            task: Mutex::new(None),
        }
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Clear the target and reveal `text`, one character per `interval`.
    ///
    /// The first character appears immediately. Must be called from within a
    /// tokio runtime.
    pub fn start(&self, text: impl Into<String>, interval: Duration) {
        let text = text.into();
        let mut task = self.lock_task();
        if let Some(handle) = task.take() {
            handle.abort();
        }

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let epoch = self.frame_tx.borrow().epoch.wrapping_add(1);
        self.frame_tx.send_replace(RevealFrame {
            epoch,
            visible: String::with_capacity(text.len()),
            total_chars,
            complete: total_chars == 0,
        });

        if total_chars == 0 {
            return;
        }

        debug!(
            "Starting reveal #{}: {} chars every {:?}",
            epoch, total_chars, interval
        );

        let frame_tx = self.frame_tx.clone();
        *task = Some(tokio::spawn(async move {
            for (i, c) in chars.into_iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(interval).await;
                }
                let mut superseded = false;
                frame_tx.send_if_modified(|frame| {
                    if frame.epoch != epoch {
                        superseded = true;
                        return false;
                    }
                    frame.visible.push(c);
                    frame.complete = i + 1 == total_chars;
                    true
                });
                if superseded {
                    return;
                }
            }
        }));
    }

    /// Abort the reveal in flight, leaving the text shown so far
    pub fn stop(&self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RevealFrame> {
        self.frame_tx.subscribe()
    }

    pub fn snapshot(&self) -> RevealFrame {
        self.frame_tx.borrow().clone()
    }

    pub fn visible_text(&self) -> String {
        self.frame_tx.borrow().visible.clone()
    }

    /// Resolve once the reveal current at the time of the call, or any
    /// reveal started after it, has shown all of its text
    pub async fn wait_complete(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as self, so this only errors on shutdown
        let _ = rx.wait_for(|frame| frame.complete).await;
    }
}

impl Default for TextReveal {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TextReveal {
    fn drop(&mut self) {
        self.stop();
    }
}
