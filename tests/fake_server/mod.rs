//! Fake POP3 and SMTP servers for integration testing
//!
//! In-process servers that speak enough of each protocol to exercise
//! the client end-to-end over real TCP on an ephemeral localhost
//! port:
//!
//! POP3: greeting -> USER/PASS -> LIST / RETR -> QUIT
//! SMTP: greeting -> EHLO -> MAIL FROM -> RCPT TO -> DATA -> verdict
//!
//! ## Module layout
//!
//! - `pop3` -- fake POP3 server and connection loop
//! - `smtp` -- fake SMTP server, records delivered DATA payloads
//! - `mailbox` -- test data model (credentials, stored messages)
//! - `io` -- shared write helpers
//!
//! Both servers record every command line they receive, so tests can
//! assert not only on responses but on what was (or was not) sent.

mod io;
mod smtp;

pub use mailbox::MailboxBuilder;
pub use pop3::FakePop3Server;
pub use smtp::FakeSmtpServer;
