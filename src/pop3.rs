//! POP3 mailbox operations
//!
//! Wraps a [`ProtocolSession`] with the POP3 command sequences:
//! USER/PASS authentication, LIST, RETR, QUIT. The session moves
//! through an explicit state machine so commands issued out of order
//! are rejected locally instead of relying on the server.

use crate::error::{Error, Result};
use crate::session::ProtocolSession;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Result of fetching a single message by id.
///
/// A missing id is a distinct outcome, never conflated with an empty
/// message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The raw message payload, lines joined with `\n`.
    Message(String),
    /// The server rejected the id; carries the `-ERR` response text.
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pop3State {
    Greeted,
    Authenticated,
    Ended,
}

/// A POP3 mailbox bound to one server connection.
pub struct Pop3Mailbox<S> {
    session: ProtocolSession<S>,
    state: Pop3State,
}

impl Pop3Mailbox<TcpStream> {
    /// Connect to a POP3 server and read its `+OK` greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the TCP connect fails, or
    /// [`Error::Io`] if the greeting cannot be read.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let session = ProtocolSession::connect(host, port, "+OK").await?;
        Ok(Self::from_session(session))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Pop3Mailbox<S> {
    /// Wrap an already-greeted session (test seam).
    #[must_use]
    pub const fn from_session(session: ProtocolSession<S>) -> Self {
        Self {
            session,
            state: Pop3State::Greeted,
        }
    }

    /// Log in with USER/PASS.
    ///
    /// Returns `Ok(true)` only if both commands get a `+OK` response.
    /// A rejected USER short-circuits: PASS is never sent in that
    /// case. Protocol-level rejection is a value, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the session is not freshly
    /// greeted, or [`Error::Io`] on transport failure.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<bool> {
        self.require_state(Pop3State::Greeted, "USER")?;

        let response = self.session.send_command(&format!("USER {username}")).await?;
        if !response.starts_with("+OK") {
            warn!("Server rejected USER: {}", response);
            return Ok(false);
        }

        let response = self.session.send_command(&format!("PASS {password}")).await?;
        if response.starts_with("+OK") {
            info!("Logged in as {}", username);
            self.state = Pop3State::Authenticated;
            Ok(true)
        } else {
            warn!("Server rejected PASS: {}", response);
            Ok(false)
        }
    }

    /// List messages as `(id, size_bytes)` pairs.
    ///
    /// A non-`+OK` response yields an empty listing. Malformed lines
    /// in the multi-line response are skipped rather than failing the
    /// whole listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if not authenticated, or
    /// [`Error::Io`] on transport failure.
    pub async fn list(&mut self) -> Result<Vec<(u32, u64)>> {
        self.require_state(Pop3State::Authenticated, "LIST")?;

        let response = self.session.send_command("LIST").await?;
        if !response.starts_with("+OK") {
            warn!("LIST rejected: {}", response);
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for line in self.session.read_until_terminator().await? {
            let mut tokens = line.split_whitespace();
            let (Some(id), Some(size)) = (tokens.next(), tokens.next()) else {
                continue;
            };
            let (Ok(id), Ok(size)) = (id.parse::<u32>(), size.parse::<u64>()) else {
                continue;
            };
            entries.push((id, size));
        }
        Ok(entries)
    }

    /// Fetch the full raw content of one message with RETR.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if not authenticated, or
    /// [`Error::Io`] on transport failure.
    pub async fn fetch(&mut self, id: u32) -> Result<FetchOutcome> {
        self.require_state(Pop3State::Authenticated, "RETR")?;

        let response = self.session.send_command(&format!("RETR {id}")).await?;
        if response.starts_with("+OK") {
            let lines = self.session.read_until_terminator().await?;
            Ok(FetchOutcome::Message(lines.join("\n")))
        } else {
            Ok(FetchOutcome::NotFound(response))
        }
    }

    /// Send QUIT and return the raw response uninterpreted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the session already ended, or
    /// [`Error::Io`] on transport failure.
    pub async fn logout(&mut self) -> Result<String> {
        if self.state == Pop3State::Ended {
            return Err(Error::Protocol("session already ended".into()));
        }
        let response = self.session.send_command("QUIT").await?;
        self.state = Pop3State::Ended;
        info!("Logged out");
        Ok(response)
    }

    /// Release the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the shutdown handshake fails.
    pub async fn close(self) -> Result<()> {
        self.session.close().await
    }

    fn require_state(&self, wanted: Pop3State, command: &str) -> Result<()> {
        if self.state == wanted {
            return Ok(());
        }
        Err(Error::Protocol(format!(
            "{command} not valid in the current session state"
        )))
    }
}
