//! Fake SMTP server.
//!
//! Accepts the EHLO / MAIL FROM / RCPT TO / DATA sequence and records
//! every delivered DATA payload. Can be configured to reject all
//! recipients with a 550, in which case the DATA payload is read but
//! the final verdict is a 554.

use super::io::write_line;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// A fake SMTP server on an ephemeral localhost port.
pub struct FakeSmtpServer {
    port: u16,
    commands: Arc<Mutex<Vec<String>>>,
    deliveries: Arc<Mutex<Vec<String>>>,
    /// Handle to the background task so it lives as long as the server.
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeSmtpServer {
    /// Start a server that accepts every recipient.
    pub async fn start() -> Self {
        Self::start_inner(false).await
    }

    /// Start a server that rejects every RCPT TO with a 550.
    pub async fn start_rejecting_recipients() -> Self {
        Self::start_inner(true).await
    }

    async fn start_inner(reject_recipients: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let commands = Arc::new(Mutex::new(Vec::new()));
        let deliveries = Arc::new(Mutex::new(Vec::new()));

        let log = commands.clone();
        let inbox = deliveries.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _addr)) = listener.accept().await else {
                    break;
                };
                let log = log.clone();
                let inbox = inbox.clone();
                tokio::spawn(async move {
                    handle_connection(stream, reject_recipients, &log, &inbox).await;
                });
            }
        });

        Self {
            port,
            commands,
            deliveries,
            _handle: handle,
        }
    }

    /// The port the server is listening on.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Every command line received so far (DATA payload lines
    /// excluded), in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Every accepted DATA payload, lines joined with `\n`.
    pub fn deliveries(&self) -> Vec<String> {
        self.deliveries.lock().unwrap().clone()
    }
}

async fn handle_connection(
    stream: TcpStream,
    reject_recipients: bool,
    log: &Mutex<Vec<String>>,
    inbox: &Mutex<Vec<String>>,
) {
    let mut reader = BufReader::new(stream);

    if write_line(&mut reader, "220 fake.test ESMTP ready\r\n")
        .await
        .is_err()
    {
        return;
    }

    let mut recipient_accepted = false;

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let trimmed = line.trim().to_string();
        if trimmed.is_empty() {
            continue;
        }
        log.lock().unwrap().push(trimmed.clone());

        let verb = trimmed
            .split(&[' ', ':'][..])
            .next()
            .unwrap_or("")
            .to_uppercase();

        let ok = match verb.as_str() {
            "EHLO" | "HELO" => write_line(&mut reader, "250 fake.test\r\n").await,
            "MAIL" => write_line(&mut reader, "250 OK\r\n").await,
            "RCPT" => {
                if reject_recipients {
                    recipient_accepted = false;
                    write_line(&mut reader, "550 mailbox unavailable\r\n").await
                } else {
                    recipient_accepted = true;
                    write_line(&mut reader, "250 OK\r\n").await
                }
            }
            "DATA" => {
                if write_line(&mut reader, "354 End data with <CR><LF>.<CR><LF>\r\n")
                    .await
                    .is_err()
                {
                    break;
                }
                match read_data_block(&mut reader).await {
                    Some(payload) => {
                        if recipient_accepted {
                            inbox.lock().unwrap().push(payload);
                            write_line(&mut reader, "250 OK queued\r\n").await
                        } else {
                            write_line(&mut reader, "554 transaction failed\r\n").await
                        }
                    }
                    None => break,
                }
            }
            "QUIT" => {
                let _ = write_line(&mut reader, "221 fake.test closing\r\n").await;
                break;
            }
            _ => write_line(&mut reader, "500 unrecognized command\r\n").await,
        };

        if ok.is_err() {
            break;
        }
    }
}

/// Read DATA payload lines until the lone-`.` terminator. Returns the
/// payload joined with `\n`, or `None` if the connection closed
/// first.
async fn read_data_block(reader: &mut BufReader<TcpStream>) -> Option<String> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "." {
            return Some(lines.join("\n"));
        }
        lines.push(trimmed.to_string());
    }
}
