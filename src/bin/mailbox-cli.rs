#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for reading a POP3 mailbox and sending mail over SMTP

use clap::{Parser, Subcommand};
use mailbox_client::{FetchOutcome, Mail, Pop3Config, Pop3Mailbox, SmtpConfig, SmtpSender};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailbox-cli")]
#[command(about = "Minimal POP3/SMTP mail client")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List messages in the mailbox
    List,

    /// Show a single message by id
    Show {
        /// Message id (as listed by `list`)
        id: u32,
    },

    /// Save a message's attachments to a directory
    Attachments {
        /// Message id (as listed by `list`)
        id: u32,

        /// Output directory
        #[arg(long, default_value = "downloads")]
        out: PathBuf,
    },

    /// Send a message
    Send {
        /// Recipient address
        #[arg(long)]
        to: String,

        /// Subject line
        #[arg(long)]
        subject: String,

        /// Body text
        #[arg(long)]
        body: String,

        /// Sender address (defaults to the POP3 username)
        #[arg(long)]
        from: Option<String>,

        /// Attachment file path (repeatable)
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match &args.command {
        Command::List => cmd_list(&args).await?,
        Command::Show { id } => cmd_show(&args, *id).await?,
        Command::Attachments { id, out } => cmd_attachments(*id, out).await?,
        Command::Send {
            to,
            subject,
            body,
            from,
            attachments,
        } => cmd_send(to, subject, body, from.as_deref(), attachments).await?,
    }

    Ok(())
}

/// Open an authenticated POP3 session from environment config.
async fn open_mailbox() -> anyhow::Result<Pop3Mailbox<tokio::net::TcpStream>> {
    let config = Pop3Config::from_env()?;
    let mut mailbox = Pop3Mailbox::connect(&config.host, config.port).await?;
    if !mailbox
        .authenticate(&config.username, &config.password)
        .await?
    {
        anyhow::bail!("login failed for {}", config.username);
    }
    Ok(mailbox)
}

async fn fetch_mail(mailbox: &mut Pop3Mailbox<tokio::net::TcpStream>, id: u32) -> anyhow::Result<Mail> {
    match mailbox.fetch(id).await? {
        FetchOutcome::Message(raw) => Ok(Mail::decode(&raw)),
        FetchOutcome::NotFound(reason) => {
            anyhow::bail!("message {id} not found: {reason}")
        }
    }
}

async fn cmd_list(args: &Args) -> anyhow::Result<()> {
    let mut mailbox = open_mailbox().await?;
    let entries = mailbox.list().await?;
    mailbox.logout().await?;
    mailbox.close().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No messages.");
        return Ok(());
    }
    println!("{:<8} {}", "ID", "Size (bytes)");
    for (id, size) in entries {
        println!("{id:<8} {size}");
    }
    Ok(())
}

async fn cmd_show(args: &Args, id: u32) -> anyhow::Result<()> {
    let mut mailbox = open_mailbox().await?;
    let mail = fetch_mail(&mut mailbox, id).await?;
    mailbox.logout().await?;
    mailbox.close().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&mail)?);
    } else {
        match mail.render() {
            Ok(rendered) => println!("{rendered}"),
            // Rendering is fallible only on the Date header; fall
            // back to the raw field values.
            Err(_) => {
                println!("From: {}", mail.from);
                println!("To: {}", mail.to);
                println!("Subject: {}", mail.subject);
                println!("Date: {}", mail.date);
                if let Some(body) = &mail.text_body {
                    println!("\n{body}");
                }
            }
        }
    }
    Ok(())
}

async fn cmd_attachments(id: u32, out: &std::path::Path) -> anyhow::Result<()> {
    let mut mailbox = open_mailbox().await?;
    let mail = fetch_mail(&mut mailbox, id).await?;
    mailbox.logout().await?;
    mailbox.close().await?;

    if mail.attachments.is_empty() {
        println!("No attachments in message {id}.");
        return Ok(());
    }

    tokio::fs::create_dir_all(out).await?;
    for (name, bytes) in &mail.attachments {
        let path = out.join(name);
        tokio::fs::write(&path, bytes).await?;
        println!("Saved {}", path.display());
    }
    Ok(())
}

async fn cmd_send(
    to: &str,
    subject: &str,
    body: &str,
    from: Option<&str>,
    attachments: &[PathBuf],
) -> anyhow::Result<()> {
    let smtp_config = SmtpConfig::from_env()?;
    let from = match from {
        Some(addr) => addr.to_string(),
        None => Pop3Config::from_env()?.username,
    };

    let mut sender = SmtpSender::connect(&smtp_config.host, smtp_config.port).await?;
    let accepted = if attachments.is_empty() {
        sender.send_plain(&from, to, subject, body).await?
    } else {
        sender
            .send_with_attachments(&from, to, subject, body, attachments)
            .await?
    };
    sender.close().await?;

    if accepted {
        println!("Message sent.");
        Ok(())
    } else {
        anyhow::bail!("server rejected the message")
    }
}
