//! Serves a [`RegisterFile`] over TCP.
//!
//! Every accepted connection talks to the same register file, so changes
//! made by one client are visible to the next. Replies are printed with
//! `\r\n` like the firmware's serial console.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use stofzuiger_session::RegisterFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A TCP listener answering as the robot.
pub struct EmulatorServer {
    listener: TcpListener,
    robot: Arc<Mutex<RegisterFile>>,
}

impl EmulatorServer {
    /// Bind to `addr`. Use port 0 to let the OS pick one.
    pub async fn bind(addr: impl ToSocketAddrs, robot: RegisterFile) -> io::Result<EmulatorServer> {
        let listener = TcpListener::bind(addr).await?;
        Ok(EmulatorServer {
            listener,
            robot: Arc::new(Mutex::new(robot)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle to the emulated register file.
    pub fn robot(&self) -> Arc<Mutex<RegisterFile>> {
        self.robot.clone()
    }

    /// Accept connections until the listener fails.
    pub async fn run(self) -> io::Result<()> {
        info!("emulator listening on {}", self.listener.local_addr()?);
        loop {
            let (stream, peer) = self.listener.accept().await?;
            info!("client connected from {}", peer);
            let robot = self.robot.clone();
            tokio::spawn(async move {
                match handle_connection(stream, robot).await {
                    Ok(()) => info!("client {} disconnected", peer),
                    Err(e) => warn!("connection error with {}: {}", peer, e),
                }
            });
        }
    }
}

async fn handle_connection(mut stream: TcpStream, robot: Arc<Mutex<RegisterFile>>) -> io::Result<()> {
    let (mut reader, mut writer) = stream.split();
    let mut read_buf = [0u8; 1024];

    loop {
        let n = reader.read(&mut read_buf).await?;
        if n == 0 {
            return Ok(());
        }

        let replies = robot.lock().await.feed(&read_buf[..n]);
        for reply in &replies {
            debug!("emulator -> {}", reply);
            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\r\n").await?;
        }
        writer.flush().await?;
    }
}
