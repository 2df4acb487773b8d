//! Local terminal state: geometry and raw mode

use crossterm::terminal::{self, disable_raw_mode, enable_raw_mode};
use tracing::debug;

use crate::error::{EasySshError, Result};

/// Terminal geometry in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermSize {
    pub cols: u16,
    pub rows: u16,
}

impl TermSize {
    pub const FALLBACK: TermSize = TermSize { cols: 80, rows: 24 };

    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Current size of the controlling terminal
    pub fn query() -> Option<Self> {
        terminal::size().ok().map(|(cols, rows)| Self::new(cols, rows))
    }

    /// Current size, or 80x24 when there is no terminal to ask
    pub fn current() -> Self {
        Self::query().unwrap_or(Self::FALLBACK)
    }
}

/// Keeps the local terminal in raw mode until dropped
///
/// Dropping restores cooked mode on every exit path, including early
/// returns and unwinding panics.
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn enable() -> Result<Self> {
        enable_raw_mode()
            .map_err(|e| EasySshError::Other(format!("Cannot enter raw mode: {}", e)))?;
        debug!("terminal raw mode on");
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        disable_raw_mode().ok();
        debug!("terminal raw mode off");
    }
}
