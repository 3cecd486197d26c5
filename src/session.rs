//! Shared line-oriented protocol session
//!
//! Provides the low-level request/response plumbing used by both
//! `Pop3Mailbox` and `SmtpSender`: connect, capture the server
//! greeting, send a command line, read single- and multi-line
//! responses.

use crate::error::{Error, Result};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// A single text-based request/response session against a POP3 or
/// SMTP server.
///
/// One session owns one connection exclusively; commands and
/// responses are strictly serialized. The transport is generic so
/// tests can substitute an in-memory stream for a real socket.
/// Dropping the session releases the connection on every exit path.
pub struct ProtocolSession<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    greeting: String,
    timeout: Option<Duration>,
}

impl ProtocolSession<TcpStream> {
    /// Open a TCP session to `host:port` and read the greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if DNS resolution or the TCP
    /// connect fails, or [`Error::Io`] if the greeting cannot be
    /// read.
    pub async fn connect(host: &str, port: u16, expected_greeting: &str) -> Result<Self> {
        let addr = format!("{host}:{port}");
        debug!("Connecting to mail server at {}", addr);

        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| Error::Connection(format!("failed to connect to {addr}: {e}")))?;

        Self::from_stream(stream, expected_greeting).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> ProtocolSession<S> {
    /// Build a session over an already-established transport.
    ///
    /// Reads the single greeting line the server sends on accept. A
    /// greeting that does not start with `expected_greeting` (`+OK`
    /// for POP3, `220` for SMTP) is logged as a warning, not treated
    /// as fatal; the session remains usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the greeting cannot be read.
    pub async fn from_stream(stream: S, expected_greeting: &str) -> Result<Self> {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut session = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            greeting: String::new(),
            timeout: None,
        };

        session.greeting = session.read_response_line().await?;
        if session.greeting.starts_with(expected_greeting) {
            debug!("Server greeting: {}", session.greeting);
        } else {
            warn!(
                "Unexpected server greeting (wanted '{}' prefix): {}",
                expected_greeting, session.greeting
            );
        }

        Ok(session)
    }

    /// The greeting line captured at connect time.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Set an I/O deadline applied to every read and write.
    ///
    /// `None` (the default) blocks indefinitely on a stalled server.
    pub fn set_timeout(&mut self, limit: Option<Duration>) {
        self.timeout = limit;
    }

    /// Send one command line and read the one-line response.
    ///
    /// Writes `line` followed by CRLF, flushes, and reads exactly one
    /// response line (CR/LF stripped).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the write fails or the connection
    /// closes before a response line arrives.
    pub async fn send_command(&mut self, line: &str) -> Result<String> {
        debug!("C: {}", line);
        let payload = format!("{line}\r\n");
        let limit = self.timeout;
        timed(limit, async {
            self.writer.write_all(payload.as_bytes()).await?;
            self.writer.flush().await
        })
        .await?;

        let response = self.read_response_line().await?;
        debug!("S: {}", response);
        Ok(response)
    }

    /// Read lines until the lone-`.` terminator of a POP3 multi-line
    /// response. The terminator is not included in the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the connection closes before the
    /// terminator is seen.
    pub async fn read_until_terminator(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_response_line().await?;
            if line == "." {
                break;
            }
            lines.push(line);
        }
        Ok(lines)
    }

    /// Write a multi-line data block, terminate it with the lone-`.`
    /// line, and read the server's one-line verdict.
    ///
    /// `payload` must already use CRLF line separators; the
    /// terminating `CRLF . CRLF` is appended here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on write failure or if the connection
    /// closes before the verdict arrives.
    pub async fn send_data(&mut self, payload: &str) -> Result<String> {
        debug!("C: <{} byte data block>", payload.len());
        let block = format!("{payload}\r\n.\r\n");
        let limit = self.timeout;
        timed(limit, async {
            self.writer.write_all(block.as_bytes()).await?;
            self.writer.flush().await
        })
        .await?;

        let response = self.read_response_line().await?;
        debug!("S: {}", response);
        Ok(response)
    }

    /// Shut the connection down. Dropping the session has the same
    /// effect; this variant surfaces shutdown errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the shutdown handshake fails.
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn read_response_line(&mut self) -> Result<String> {
        let limit = self.timeout;
        let mut line = String::new();
        let read = timed(limit, self.reader.read_line(&mut line)).await?;
        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

/// Run `op` under the session deadline, if one is set.
async fn timed<T, F>(limit: Option<Duration>, op: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(duration) => match tokio::time::timeout(duration, op).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "server did not respond within the configured deadline",
            )),
        },
        None => op.await,
    }
}
