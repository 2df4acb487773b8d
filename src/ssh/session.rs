//! Interactive shell over a remote session

use std::io::Write;

use async_trait::async_trait;
use russh::{client, Channel, ChannelMsg, Disconnect, Pty};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::resize::ResizeBridge;
use super::terminal::TermSize;
use super::SshClient;
use crate::error::{EasySshError, Result};

/// Terminal type requested for the remote PTY
pub const TERM: &str = "xterm-256color";

/// Shells tried in order until one starts
pub const SHELLS: [&str; 2] = ["bash", "sh"];

const TERMINAL_MODES: [(Pty, u32); 3] = [
    (Pty::ECHO, 1),
    (Pty::TTY_OP_ISPEED, 1),
    (Pty::TTY_OP_OSPEED, 14400),
];

/// How a remote command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// The command ran; exit status if the server reported one
    Exited(Option<u32>),
    /// The server refused to start the command
    Rejected,
}

/// "Not executable" and "not found" statuses of the server's login shell
const NOT_RUNNABLE: [u32; 2] = [126, 127];

impl ShellExit {
    /// Classify a finished command from its exit status
    ///
    /// 126 and 127 only mean the command never started when no user input
    /// reached it. After input they are the status of the user's last command.
    pub fn from_status(status: Option<u32>, forwarded_input: bool) -> Self {
        match status {
            Some(code) if !forwarded_input && NOT_RUNNABLE.contains(&code) => Self::Rejected,
            status => Self::Exited(status),
        }
    }

    /// Whether the command actually started
    pub fn started(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Local ends of the interactive streams
///
/// Shared by every shell attempt, so one stdin reader serves both `bash` and
/// the `sh` fallback.
pub struct ShellIo {
    stdin: mpsc::Receiver<Vec<u8>>,
    stdin_open: bool,
    resize: mpsc::Receiver<TermSize>,
}

impl ShellIo {
    pub fn new(stdin: mpsc::Receiver<Vec<u8>>, resize: mpsc::Receiver<TermSize>) -> Self {
        Self {
            stdin,
            stdin_open: true,
            resize,
        }
    }
}

/// The remote side of an SSH connection, as the launcher drives it
#[async_trait]
pub trait RemoteSession: Send {
    /// Request a PTY for subsequent commands
    async fn request_pty(&mut self, term: &str, size: TermSize) -> Result<()>;

    /// Run `command` with the terminal wired to `io` until it finishes
    async fn run(&mut self, command: &str, io: &mut ShellIo) -> Result<ShellExit>;

    /// Disconnect; errors are ignored
    async fn close(&mut self);
}

/// Try each of [`SHELLS`] until one starts
pub async fn run_shell_with_fallback<S>(session: &mut S, io: &mut ShellIo) -> Result<ShellExit>
where
    S: RemoteSession + ?Sized,
{
    for shell in SHELLS {
        let exit = session.run(shell, io).await?;
        if exit.started() {
            debug!(shell, ?exit, "shell finished");
            return Ok(exit);
        }
        warn!(shell, ?exit, "shell could not start");
    }
    Err(EasySshError::ShellUnavailable)
}

/// Run an interactive shell in a PTY sized to the local terminal
///
/// `enter_raw_mode` returns a guard (normally `RawModeGuard::enable`) that
/// restores the terminal when dropped. It is held for the duration and
/// released on every exit path. The session is closed before returning,
/// whatever the outcome.
pub async fn run_interactive_shell<S, G>(
    session: &mut S,
    enter_raw_mode: impl FnOnce() -> Result<G>,
) -> Result<ShellExit>
where
    S: RemoteSession + ?Sized,
{
    let size = TermSize::current();

    if let Err(e) = session.request_pty(TERM, size).await {
        session.close().await;
        return Err(e);
    }

    let raw_mode = match enter_raw_mode() {
        Ok(guard) => guard,
        Err(e) => {
            session.close().await;
            return Err(e);
        }
    };

    let (resize_tx, resize_rx) = mpsc::channel::<TermSize>(10);
    ResizeBridge::new(size).spawn(resize_tx);

    let mut io = ShellIo::new(spawn_stdin_reader(), resize_rx);

    let result = tokio::select! {
        result = run_shell_with_fallback(session, &mut io) => result,
        _ = termination_signal() => Err(EasySshError::Cancelled),
    };

    drop(raw_mode);
    session.close().await;

    result
}

/// Blocking stdin reader feeding the shell loop
fn spawn_stdin_reader() -> mpsc::Receiver<Vec<u8>> {
    let (stdin_tx, stdin_rx) = mpsc::channel::<Vec<u8>>(100);

    std::thread::spawn(move || {
        use std::io::Read;
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 1024];

        loop {
            match stdin.read(&mut buf) {
                Ok(0) => break, // EOF
                Ok(n) => {
                    if stdin_tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    stdin_rx
}

/// Resolves when the process is asked to terminate
#[cfg(unix)]
async fn termination_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(mut term), Ok(mut hup)) => {
            tokio::select! {
                _ = term.recv() => debug!("received SIGTERM"),
                _ = hup.recv() => debug!("received SIGHUP"),
            }
        }
        _ => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn termination_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

struct PtyRequest {
    term: String,
    size: TermSize,
}

/// [`RemoteSession`] over a russh client connection
///
/// Each command runs on its own channel; the PTY request is replayed on
/// every new channel.
pub struct RusshSession {
    handle: client::Handle<SshClient>,
    channel: Option<Channel<client::Msg>>,
    pty: Option<PtyRequest>,
}

impl RusshSession {
    /// Open the first session channel on an authenticated connection
    pub async fn open(handle: client::Handle<SshClient>) -> Result<Self> {
        let mut session = Self {
            handle,
            channel: None,
            pty: None,
        };
        session.channel = Some(session.open_channel().await?);
        Ok(session)
    }

    async fn open_channel(&self) -> Result<Channel<client::Msg>> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| EasySshError::Connection(e.to_string()))?;

        if let Some(pty) = &self.pty {
            send_pty_request(&mut channel, pty).await?;
        }
        Ok(channel)
    }
}

async fn send_pty_request(channel: &mut Channel<client::Msg>, pty: &PtyRequest) -> Result<()> {
    channel
        .request_pty(
            false,
            &pty.term,
            pty.size.cols as u32,
            pty.size.rows as u32,
            0,
            0,
            &TERMINAL_MODES,
        )
        .await
        .map_err(|e| EasySshError::Connection(e.to_string()))
}

#[async_trait]
impl RemoteSession for RusshSession {
    async fn request_pty(&mut self, term: &str, size: TermSize) -> Result<()> {
        let pty = PtyRequest {
            term: term.to_string(),
            size,
        };

        if self.channel.is_none() {
            self.channel = Some(self.open_channel().await?);
        }
        if let Some(channel) = self.channel.as_mut() {
            send_pty_request(channel, &pty).await?;
        }

        self.pty = Some(pty);
        Ok(())
    }

    async fn run(&mut self, command: &str, io: &mut ShellIo) -> Result<ShellExit> {
        let mut channel = match self.channel.take() {
            Some(channel) => channel,
            None => self.open_channel().await?,
        };

        channel
            .exec(true, command)
            .await
            .map_err(|e| EasySshError::Connection(e.to_string()))?;

        let mut exit_status = None;
        let mut forwarded_input = false;

        loop {
            tokio::select! {
                // Messages from the server
                msg = channel.wait() => {
                    match msg {
                        Some(ChannelMsg::Data { data }) => {
                            std::io::stdout().write_all(&data).ok();
                            std::io::stdout().flush().ok();
                        }
                        Some(ChannelMsg::ExtendedData { data, ext: _ }) => {
                            std::io::stderr().write_all(&data).ok();
                            std::io::stderr().flush().ok();
                        }
                        Some(ChannelMsg::Failure) => {
                            channel.close().await.ok();
                            return Ok(ShellExit::Rejected);
                        }
                        Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                            exit_status = Some(status);
                        }
                        Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                            eprint!("\r\n[Process terminated by signal: {:?}]\r\n", signal_name);
                        }
                        Some(ChannelMsg::Close) | None => break,
                        _ => {}
                    }
                }

                // User input
                data = io.stdin.recv(), if io.stdin_open => {
                    match data {
                        Some(data) => {
                            channel.data(&data[..]).await
                                .map_err(|e| EasySshError::Connection(e.to_string()))?;
                            forwarded_input = true;
                        }
                        None => {
                            io.stdin_open = false;
                            channel.eof().await.ok();
                        }
                    }
                }

                // Terminal resize
                Some(size) = io.resize.recv() => {
                    if let Some(pty) = self.pty.as_mut() {
                        pty.size = size;
                    }
                    channel
                        .window_change(size.cols as u32, size.rows as u32, 0, 0)
                        .await
                        .ok();
                }
            }
        }

        channel.close().await.ok();
        Ok(ShellExit::from_status(exit_status, forwarded_input))
    }

    async fn close(&mut self) {
        if let Some(channel) = self.channel.as_mut() {
            channel.close().await.ok();
        }
        self.channel = None;
        self.handle
            .disconnect(Disconnect::ByApplication, "User disconnected", "en")
            .await
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Scripted session: each `run` pops the next outcome
    struct MockSession {
        outcomes: Vec<Result<ShellExit>>,
        commands: Vec<String>,
        closed: bool,
    }

    impl MockSession {
        fn new(mut outcomes: Vec<Result<ShellExit>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes,
                commands: Vec::new(),
                closed: false,
            }
        }
    }

    #[async_trait]
    impl RemoteSession for MockSession {
        async fn request_pty(&mut self, _term: &str, _size: TermSize) -> Result<()> {
            Ok(())
        }

        async fn run(&mut self, command: &str, _io: &mut ShellIo) -> Result<ShellExit> {
            self.commands.push(command.to_string());
            self.outcomes.pop().expect("unexpected run")
        }

        async fn close(&mut self) {
            self.closed = true;
        }
    }

    fn io() -> ShellIo {
        let (_stdin_tx, stdin_rx) = mpsc::channel(1);
        let (_resize_tx, resize_rx) = mpsc::channel(1);
        ShellIo::new(stdin_rx, resize_rx)
    }

    /// Restores nothing; records that it was dropped
    struct FakeRawMode(Arc<AtomicBool>);

    impl Drop for FakeRawMode {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_started() {
        assert!(ShellExit::Exited(Some(0)).started());
        assert!(ShellExit::Exited(Some(1)).started());
        assert!(ShellExit::Exited(Some(127)).started());
        assert!(ShellExit::Exited(None).started());
        assert!(!ShellExit::Rejected.started());
    }

    #[test]
    fn test_exit_status_classification() {
        assert_eq!(ShellExit::from_status(Some(127), false), ShellExit::Rejected);
        assert_eq!(ShellExit::from_status(Some(126), false), ShellExit::Rejected);
        assert_eq!(ShellExit::from_status(Some(1), false), ShellExit::Exited(Some(1)));
        assert_eq!(ShellExit::from_status(None, false), ShellExit::Exited(None));

        // `exit` after a missing command reports the command's 127
        assert_eq!(ShellExit::from_status(Some(127), true), ShellExit::Exited(Some(127)));
        assert_eq!(ShellExit::from_status(Some(126), true), ShellExit::Exited(Some(126)));
    }

    #[tokio::test]
    async fn test_bash_success_skips_sh() {
        let mut session = MockSession::new(vec![Ok(ShellExit::Exited(Some(0)))]);

        let exit = run_shell_with_fallback(&mut session, &mut io()).await.unwrap();

        assert_eq!(exit, ShellExit::Exited(Some(0)));
        assert_eq!(session.commands, ["bash"]);
    }

    #[tokio::test]
    async fn test_bash_nonzero_exit_is_not_a_fallback() {
        let mut session = MockSession::new(vec![Ok(ShellExit::Exited(Some(1)))]);

        let exit = run_shell_with_fallback(&mut session, &mut io()).await.unwrap();

        assert_eq!(exit, ShellExit::Exited(Some(1)));
        assert_eq!(session.commands, ["bash"]);
    }

    #[tokio::test]
    async fn test_bash_session_ending_with_127_is_not_a_fallback() {
        let mut session = MockSession::new(vec![
            Ok(ShellExit::from_status(Some(127), true)),
            Ok(ShellExit::Exited(Some(0))),
        ]);

        let exit = run_shell_with_fallback(&mut session, &mut io()).await.unwrap();

        assert_eq!(exit, ShellExit::Exited(Some(127)));
        assert_eq!(session.commands, ["bash"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_sh() {
        let mut session = MockSession::new(vec![
            Ok(ShellExit::from_status(Some(127), false)),
            Ok(ShellExit::Exited(Some(0))),
        ]);

        let exit = run_shell_with_fallback(&mut session, &mut io()).await.unwrap();

        assert_eq!(exit, ShellExit::Exited(Some(0)));
        assert_eq!(session.commands, ["bash", "sh"]);
    }

    #[tokio::test]
    async fn test_no_shell_available() {
        let mut session =
            MockSession::new(vec![Ok(ShellExit::Rejected), Ok(ShellExit::Rejected)]);

        let result = run_shell_with_fallback(&mut session, &mut io()).await;

        assert!(matches!(result, Err(EasySshError::ShellUnavailable)));
        assert_eq!(session.commands, ["bash", "sh"]);
    }

    #[tokio::test]
    async fn test_transport_error_stops_fallback() {
        let mut session =
            MockSession::new(vec![Err(EasySshError::Connection("reset".into()))]);

        let result = run_shell_with_fallback(&mut session, &mut io()).await;

        assert!(matches!(result, Err(EasySshError::Connection(_))));
        assert_eq!(session.commands, ["bash"]);
        assert!(!session.closed);
    }

    #[tokio::test]
    async fn test_interactive_shell_unavailable_closes_session() {
        let restored = Arc::new(AtomicBool::new(false));
        let mut session =
            MockSession::new(vec![Ok(ShellExit::Rejected), Ok(ShellExit::Rejected)]);

        let result = run_interactive_shell(&mut session, || {
            Ok(FakeRawMode(restored.clone()))
        })
        .await;

        assert!(matches!(result, Err(EasySshError::ShellUnavailable)));
        assert!(session.closed);
        assert!(restored.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_interactive_shell_success_restores_terminal() {
        let restored = Arc::new(AtomicBool::new(false));
        let mut session = MockSession::new(vec![Ok(ShellExit::Exited(Some(0)))]);

        let exit = run_interactive_shell(&mut session, || {
            Ok(FakeRawMode(restored.clone()))
        })
        .await
        .unwrap();

        assert_eq!(exit, ShellExit::Exited(Some(0)));
        assert!(session.closed);
        assert!(restored.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_interactive_shell_transport_error_closes_session() {
        let restored = Arc::new(AtomicBool::new(false));
        let mut session =
            MockSession::new(vec![Err(EasySshError::Connection("reset".into()))]);

        let result = run_interactive_shell(&mut session, || {
            Ok(FakeRawMode(restored.clone()))
        })
        .await;

        assert!(matches!(result, Err(EasySshError::Connection(_))));
        assert!(session.closed);
        assert!(restored.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_raw_mode_failure_closes_session_without_running() {
        let mut session = MockSession::new(vec![]);

        let result = run_interactive_shell(&mut session, || {
            Err::<FakeRawMode, _>(EasySshError::Other("no tty".into()))
        })
        .await;

        assert!(matches!(result, Err(EasySshError::Other(_))));
        assert!(session.closed);
        assert!(session.commands.is_empty());
    }
}
