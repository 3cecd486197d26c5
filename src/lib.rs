//! Minimal POP3/SMTP mail client library
//!
//! Speaks the two classic line-oriented mail protocols over plain
//! TCP: POP3 for mailbox retrieval and SMTP for submission, plus a
//! tolerant MIME decoder that turns raw message payload into a
//! structured [`Mail`] (headers, plain-text body, attachments).
//!
//! One [`ProtocolSession`] owns one connection; [`Pop3Mailbox`] and
//! [`SmtpSender`] drive protocol-specific command sequences on top
//! of it.

mod config;
mod error;
mod mime;
mod pop3;
mod session;
mod smtp;

pub use config::{Pop3Config, SmtpConfig};
pub use error::{Error, Result};
pub use mime::Mail;
pub use pop3::{FetchOutcome, Pop3Mailbox};
pub use session::ProtocolSession;
pub use smtp::SmtpSender;
