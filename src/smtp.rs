//! SMTP mail submission
//!
//! Wraps a [`ProtocolSession`] with the SMTP command sequence
//! (EHLO, MAIL FROM, RCPT TO, DATA) for plain-text sends and for
//! multipart/mixed envelopes carrying base64-encoded attachments.

use crate::error::{Error, Result};
use crate::session::ProtocolSession;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};
use uuid::Uuid;

/// Base64 lines in attachment parts wrap at this width (RFC 2045).
const BASE64_LINE_WIDTH: usize = 76;

/// An SMTP submission client bound to one server connection.
///
/// Each send performs a complete EHLO-to-DATA transaction. Success is
/// a value: the server's final verdict starting with `250`.
pub struct SmtpSender<S> {
    session: ProtocolSession<S>,
    ehlo_hostname: String,
}

impl SmtpSender<TcpStream> {
    /// Connect to an SMTP server and read its `220` greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the TCP connect fails, or
    /// [`Error::Io`] if the greeting cannot be read.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let session = ProtocolSession::connect(host, port, "220").await?;
        Ok(Self::from_session(session))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> SmtpSender<S> {
    /// Wrap an already-greeted session (test seam).
    #[must_use]
    pub fn from_session(session: ProtocolSession<S>) -> Self {
        Self {
            session,
            ehlo_hostname: "localhost".to_string(),
        }
    }

    /// Hostname announced in EHLO (default `localhost`).
    pub fn set_ehlo_hostname(&mut self, hostname: impl Into<String>) {
        self.ehlo_hostname = hostname.into();
    }

    /// Send a plain-text message.
    ///
    /// Returns whether the server's final response to the DATA block
    /// starts with `250`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on transport failure.
    pub async fn send_plain(
        &mut self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<bool> {
        self.envelope_handshake(from, to).await?;

        let payload = format!("Subject: {subject}\r\n\r\n{body}");
        let response = self.session.send_data(&payload).await?;
        let accepted = response.starts_with("250");
        if accepted {
            info!("Message to {} accepted", to);
        }
        Ok(accepted)
    }

    /// Send a message with file attachments as a multipart/mixed
    /// envelope.
    ///
    /// Every attachment is read into memory before the first command
    /// is written, so a missing file never leaves a half-sent DATA
    /// block: it fails with zero bytes on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentNotFound`] if any path is not a
    /// readable file, or [`Error::Io`] on transport failure.
    pub async fn send_with_attachments(
        &mut self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
        attachment_paths: &[PathBuf],
    ) -> Result<bool> {
        let attachments = load_attachments(attachment_paths).await?;

        let boundary = generate_boundary();
        let payload = build_multipart_payload(subject, body, &boundary, &attachments);

        self.envelope_handshake(from, to).await?;
        let response = self.session.send_data(&payload).await?;
        let accepted = response.starts_with("250");
        if accepted {
            info!(
                "Message to {} with {} attachment(s) accepted",
                to,
                attachments.len()
            );
        }
        Ok(accepted)
    }

    /// Release the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the shutdown handshake fails.
    pub async fn close(self) -> Result<()> {
        self.session.close().await
    }

    /// EHLO, MAIL FROM, RCPT TO, DATA. Intermediate responses are
    /// logged but not validated; the final DATA verdict decides the
    /// outcome.
    async fn envelope_handshake(&mut self, from: &str, to: &str) -> Result<()> {
        let ehlo = format!("EHLO {}", self.ehlo_hostname);
        let response = self.session.send_command(&ehlo).await?;
        debug!("EHLO: {}", response);

        let response = self
            .session
            .send_command(&format!("MAIL FROM:<{from}>"))
            .await?;
        debug!("MAIL FROM: {}", response);

        let response = self
            .session
            .send_command(&format!("RCPT TO:<{to}>"))
            .await?;
        debug!("RCPT TO: {}", response);

        // The 354 continuation prompt is informational here.
        let response = self.session.send_command("DATA").await?;
        debug!("DATA: {}", response);
        Ok(())
    }
}

/// Read every attachment into memory up front.
async fn load_attachments(paths: &[PathBuf]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut attachments = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|_| Error::AttachmentNotFound(path.clone()))?;
        attachments.push((file_basename(path), bytes));
    }
    Ok(attachments)
}

fn file_basename(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "attachment".to_string(), |name| name.to_string_lossy().into_owned())
}

/// A boundary token unique per message, so it cannot collide with a
/// boundary reused earlier in the process.
fn generate_boundary() -> String {
    format!("=_Part_{}", Uuid::new_v4().simple())
}

fn build_multipart_payload(
    subject: &str,
    body: &str,
    boundary: &str,
    attachments: &[(String, Vec<u8>)],
) -> String {
    let mut payload = format!(
        "Subject: {subject}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\
         \r\n\
         --{boundary}\r\n\
         Content-Type: text/plain; charset=\"UTF-8\"\r\n\
         \r\n\
         {body}\r\n"
    );

    for (name, bytes) in attachments {
        payload.push_str(&format!(
            "--{boundary}\r\n\
             Content-Type: application/octet-stream; name=\"{name}\"\r\n\
             Content-Transfer-Encoding: base64\r\n\
             Content-Disposition: attachment; filename=\"{name}\"\r\n\
             \r\n"
        ));
        payload.push_str(&encode_base64_wrapped(bytes));
        payload.push_str("\r\n");
    }

    payload.push_str(&format!("--{boundary}--"));
    payload
}

/// Base64-encode `data` and wrap the output at 76 columns.
pub(crate) fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = BASE64.encode(data);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_WIDTH * 2);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE_WIDTH) {
        if !wrapped.is_empty() {
            wrapped.push_str("\r\n");
        }
        wrapped.push_str(&String::from_utf8_lossy(chunk));
    }
    wrapped
}
