//! TCP link to the robot's serial bridge.
//!
//! The [`Session`] is synchronous: it queues outgoing commands on a
//! [`ChannelTransport`] and the [`Link`] writes them to the socket between
//! reads. One task owns the link, so lines are handled strictly in arrival
//! order.

use std::io::{self, Write};
use std::net::SocketAddr;
use std::time::Duration;

use stofzuiger_session::{LineTransport, Session, SessionConfig};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::display::render_status;
use crate::error::{LinkError, Result};

const READ_BUFFER_SIZE: usize = 1024;

// ============================================================================
// Channel Transport
// ============================================================================

/// [`LineTransport`] that queues lines for the link task.
///
/// The queue is unbounded: one TIME_COUNT report can ask for a read per
/// schedule entry before the link gets to flush, and none of them may be
/// lost.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelTransport {
    /// Create a transport and the receiver the link drains.
    pub fn channel() -> (ChannelTransport, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelTransport { tx }, rx)
    }
}

impl LineTransport for ChannelTransport {
    fn send_line(&mut self, data: &[u8]) -> io::Result<()> {
        self.tx
            .send(data.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "link closed"))
    }
}

/// Session type driven by a [`Link`].
pub type LinkSession = Session<ChannelTransport>;

// ============================================================================
// Terminal Input
// ============================================================================

/// One line typed in the interactive terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCommand {
    /// `:add`
    AddTiming,
    /// `:remove`
    RemoveTiming,
    /// `:status`
    Status,
    /// `:quit`
    Quit,
    /// Anything else is sent verbatim.
    Raw(String),
    /// Blank line.
    Empty,
}

impl TerminalCommand {
    pub fn parse(line: &str) -> TerminalCommand {
        match line.trim() {
            "" => TerminalCommand::Empty,
            ":add" => TerminalCommand::AddTiming,
            ":remove" => TerminalCommand::RemoveTiming,
            ":status" => TerminalCommand::Status,
            ":quit" | ":q" => TerminalCommand::Quit,
            text => TerminalCommand::Raw(text.to_string()),
        }
    }
}

/// What woke the terminal loop.
enum Wake {
    Read(io::Result<usize>),
    Input(io::Result<Option<String>>),
}

// ============================================================================
// Link
// ============================================================================

/// A connected session plus its socket.
pub struct Link {
    session: LinkSession,
    outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    read_buf: Vec<u8>,
    peer: SocketAddr,
}

impl Link {
    /// Connect to `endpoint` and start the initial fetch.
    pub async fn connect(endpoint: &str, config: SessionConfig) -> Result<Link> {
        let stream = TcpStream::connect(endpoint).await?;
        Link::from_stream(stream, config)
    }

    /// Wrap an established connection and start the initial fetch.
    pub fn from_stream(stream: TcpStream, config: SessionConfig) -> Result<Link> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        let (transport, outgoing) = ChannelTransport::channel();

        let mut session = Session::new(transport, config);
        info!("connected to {}", peer);
        session.on_connected();

        Ok(Link {
            session,
            outgoing,
            reader,
            writer,
            read_buf: vec![0u8; READ_BUFFER_SIZE],
            peer,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn session(&self) -> &LinkSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut LinkSession {
        &mut self.session
    }

    /// Write every queued command to the socket.
    pub async fn flush(&mut self) -> Result<()> {
        let mut wrote = false;
        while let Ok(data) = self.outgoing.try_recv() {
            self.writer.write_all(&data).await?;
            wrote = true;
        }
        if wrote {
            self.writer.flush().await?;
        }
        Ok(())
    }

    /// Flush, then wait for the next chunk from the robot and handle it.
    /// Returns the complete lines it contained.
    pub async fn receive(&mut self) -> Result<Vec<String>> {
        self.flush().await?;
        let result = self.reader.read(&mut self.read_buf).await;
        self.handle_read(result)
    }

    fn handle_read(&mut self, result: io::Result<usize>) -> Result<Vec<String>> {
        let n = match result {
            Ok(0) => {
                info!("{} closed the connection", self.peer);
                self.session.on_disconnected();
                return Err(LinkError::Disconnected);
            }
            Ok(n) => n,
            Err(e) => {
                warn!("read from {} failed: {}", self.peer, e);
                self.session.on_disconnected();
                return Err(e.into());
            }
        };
        trace!("read {} bytes", n);
        Ok(self.session.on_bytes(&self.read_buf[..n]))
    }

    /// Keep receiving until `done` holds for the session.
    ///
    /// Fails with [`LinkError::Timeout`] if that takes longer than
    /// `timeout`. Nothing is resent; the bound only decides when to give up.
    pub async fn wait_for<F>(&mut self, timeout: Duration, mut done: F) -> Result<()>
    where
        F: FnMut(&LinkSession) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            self.flush().await?;
            if done(&self.session) {
                return Ok(());
            }
            match tokio::time::timeout_at(deadline, self.reader.read(&mut self.read_buf)).await {
                Ok(result) => {
                    self.handle_read(result)?;
                }
                Err(_) => return Err(LinkError::Timeout(timeout)),
            }
        }
    }

    /// Wait until every register and schedule entry has been fetched.
    pub async fn sync(&mut self, timeout: Duration) -> Result<()> {
        self.wait_for(timeout, |session| session.store().is_synchronized())
            .await?;
        debug!(
            "synchronized, {} schedule entries",
            self.session.store().time_count()
        );
        Ok(())
    }

    /// Interactive terminal.
    ///
    /// Lines from `input` are sent raw unless they are one of the `:`
    /// helpers. Every line received from the robot is written to `output`.
    /// Returns on `:quit`, at the end of `input`, or when the robot hangs up.
    pub async fn run_terminal<R, W>(&mut self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut input = input.lines();
        loop {
            self.flush().await?;

            let wake = tokio::select! {
                result = self.reader.read(&mut self.read_buf) => Wake::Read(result),
                line = input.next_line() => Wake::Input(line),
            };

            match wake {
                Wake::Read(result) => {
                    for line in self.handle_read(result)? {
                        writeln!(output, "{}", line)?;
                    }
                    output.flush()?;
                }
                Wake::Input(Ok(Some(line))) => {
                    if !self.handle_terminal_line(&line, output)? {
                        return self.flush().await;
                    }
                }
                Wake::Input(Ok(None)) => return self.flush().await,
                Wake::Input(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Returns `false` when the operator asked to quit.
    fn handle_terminal_line<W: Write>(&mut self, line: &str, output: &mut W) -> Result<bool> {
        let outcome = match TerminalCommand::parse(line) {
            TerminalCommand::Quit => return Ok(false),
            TerminalCommand::Empty => Ok(()),
            TerminalCommand::Status => {
                write!(output, "{}", render_status(&self.session.store().snapshot()))?;
                Ok(())
            }
            TerminalCommand::AddTiming => self.session.add_timing(),
            TerminalCommand::RemoveTiming => match self.session.remove_timing() {
                Ok(false) => {
                    writeln!(output, "schedule is empty")?;
                    Ok(())
                }
                other => other.map(|_| ()),
            },
            TerminalCommand::Raw(text) => self.session.send_raw(&text),
        };
        if let Err(e) = outcome {
            writeln!(output, "error: {}", e)?;
        }
        output.flush()?;
        Ok(true)
    }

    /// Flush pending commands and hang up.
    pub async fn close(mut self) -> Result<()> {
        self.flush().await?;
        self.writer.shutdown().await?;
        self.session.on_disconnected();
        info!("disconnected from {}", self.peer);
        Ok(())
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("peer", &self.peer)
            .field("session", &self.session)
            .finish()
    }
}
