//! Forwarding of local terminal resizes to the remote PTY

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::TermSize;

/// Watches local terminal geometry and emits changes
pub struct ResizeBridge {
    last: TermSize,
}

impl ResizeBridge {
    pub fn new(initial: TermSize) -> Self {
        Self { last: initial }
    }

    pub fn last(&self) -> TermSize {
        self.last
    }

    /// Record `current`, returning it only if it differs from the last size
    pub fn observe(&mut self, current: TermSize) -> Option<TermSize> {
        if current == self.last {
            return None;
        }
        self.last = current;
        Some(current)
    }

    /// Run the bridge as a background task feeding `tx`
    ///
    /// Never cancelled explicitly: it ends with the runtime, or once the
    /// session side of the channel is gone.
    pub fn spawn(mut self, tx: mpsc::Sender<TermSize>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut notifications = match ResizeNotifications::new() {
                Ok(n) => n,
                Err(e) => {
                    debug!("resize notifications unavailable: {}", e);
                    return;
                }
            };

            while notifications.next().await {
                let Some(current) = TermSize::query() else {
                    continue;
                };
                if let Some(size) = self.observe(current) {
                    debug!(cols = size.cols, rows = size.rows, "terminal resized");
                    if tx.send(size).await.is_err() {
                        break;
                    }
                }
            }
        })
    }
}

/// SIGWINCH on unix
#[cfg(unix)]
struct ResizeNotifications(tokio::signal::unix::Signal);

#[cfg(unix)]
impl ResizeNotifications {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self(signal(SignalKind::window_change())?))
    }

    async fn next(&mut self) -> bool {
        self.0.recv().await.is_some()
    }
}

/// Polling elsewhere
#[cfg(not(unix))]
struct ResizeNotifications(tokio::time::Interval);

#[cfg(not(unix))]
impl ResizeNotifications {
    fn new() -> std::io::Result<Self> {
        Ok(Self(tokio::time::interval(std::time::Duration::from_millis(250))))
    }

    async fn next(&mut self) -> bool {
        self.0.tick().await;
        true
    }
}
