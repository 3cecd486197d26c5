//! POP3 and SMTP connection configuration

use crate::error::{Error, Result};
use std::env;

/// POP3 server configuration and account credentials
#[derive(Debug, Clone)]
pub struct Pop3Config {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Pop3Config {
    /// Load POP3 configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `POP3_USERNAME`
    /// - `POP3_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `POP3_HOST` (default: `127.0.0.1`)
    /// - `POP3_PORT` (default: `110`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: env::var("POP3_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("POP3_PORT")
                .unwrap_or_else(|_| "110".to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid POP3_PORT: {e}")))?,
            username: env::var("POP3_USERNAME")
                .map_err(|_| Error::Config("POP3_USERNAME not set".into()))?,
            password: env::var("POP3_PASSWORD")
                .map_err(|_| Error::Config("POP3_PASSWORD not set".into()))?,
        })
    }
}

/// SMTP server configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
}

impl SmtpConfig {
    /// Load SMTP configuration from environment variables
    ///
    /// Reads from `.env` file if present. Optional (with defaults):
    /// - `SMTP_HOST` (default: `127.0.0.1`)
    /// - `SMTP_PORT` (default: `25`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: env::var("SMTP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "25".to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid SMTP_PORT: {e}")))?,
        })
    }
}
