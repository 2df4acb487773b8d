//! SSH client implementation using russh

mod auth;
mod client;
mod resize;
mod session;
mod target;
mod terminal;

pub use auth::AuthStrategy;
pub use client::{connect, SshClient, CONNECT_TIMEOUT};
pub use resize::ResizeBridge;
pub use session::{
    run_interactive_shell, run_shell_with_fallback, RemoteSession, RusshSession, ShellExit,
    ShellIo, SHELLS, TERM,
};
pub use target::{parse_target_literal, Target, DEFAULT_PORT, DEFAULT_USER};
pub use terminal::{RawModeGuard, TermSize};
