//! MIME message decoding
//!
//! Turns a raw RFC 5322/2045-ish message blob into a structured
//! [`Mail`]. Decoding is deliberately tolerant: malformed boundaries,
//! undecodable payloads, and unclassifiable parts degrade to partial
//! data instead of failing, so the caller can always render
//! something.
//!
//! Parsing is a literal line/substring scanner, never regex:
//! boundary tokens are used as literal split delimiters, so
//! metacharacters inside a boundary cannot corrupt the split.

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use std::collections::BTreeMap;

/// A decoded mail message.
///
/// Header fields keep their original text (the `Date` header is not
/// re-parsed at decode time). Attachments are keyed by the real
/// `filename="..."` attribute, with duplicates disambiguated by a
/// `-N` suffix and nameless attachments falling back to a generated
/// `attachment-N` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mail {
    pub return_path: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: String,
    pub text_body: Option<String>,
    pub attachments: BTreeMap<String, Vec<u8>>,
}

impl Mail {
    /// Decode a raw message. Never fails; absent headers yield empty
    /// strings and a message with no multipart boundary becomes a
    /// plain-text mail with the trimmed body and no attachments.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        let normalized = raw.replace("\r\n", "\n");
        let (headers, body) = match normalized.split_once("\n\n") {
            Some((headers, body)) => (headers, body),
            // No blank line: the entire input is header, body empty.
            None => (normalized.as_str(), ""),
        };

        let mut mail = Self {
            return_path: header_value(headers, "Return-Path"),
            from: header_value(headers, "From"),
            to: header_value(headers, "To"),
            subject: header_value(headers, "Subject"),
            date: header_value(headers, "Date"),
            text_body: None,
            attachments: BTreeMap::new(),
        };

        match boundary_token(headers) {
            Some(boundary) => parse_multipart(body, &boundary, &mut mail),
            None => mail.text_body = Some(body.trim().to_string()),
        }

        mail
    }

    /// Render the mail human-readably: headers, body, attachment
    /// names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if the `Date` header is not an
    /// RFC 3339 timestamp. Decoding does not depend on this;
    /// rendering is a separate fallible layer.
    pub fn render(&self) -> Result<String> {
        let date = chrono::DateTime::parse_from_rfc3339(&self.date).map_err(|e| {
            Error::Format(format!("unparseable Date header '{}': {e}", self.date))
        })?;

        let mut out = format!(
            "From: {}\nTo: {}\nSubject: {}\nDate: {}\n",
            self.from,
            self.to,
            self.subject,
            date.format("%B %d, %Y %H:%M:%S"),
        );

        out.push('\n');
        if let Some(body) = &self.text_body {
            out.push_str(body);
            out.push('\n');
        }

        if !self.attachments.is_empty() {
            out.push_str("\nAttachments:\n");
            for name in self.attachments.keys() {
                out.push_str(" - ");
                out.push_str(name);
                out.push('\n');
            }
        }

        Ok(out)
    }
}

/// First `Name: value` match in the header block, trimmed. Absence
/// yields an empty string, never an error.
fn header_value(headers: &str, name: &str) -> String {
    for line in headers.lines() {
        let Some((field, rest)) = line.split_once(':') else {
            continue;
        };
        if field.eq_ignore_ascii_case(name) {
            return rest.trim().to_string();
        }
    }
    String::new()
}

/// The `boundary="token"` parameter of the Content-Type header, if
/// any.
fn boundary_token(headers: &str) -> Option<String> {
    let marker = "boundary=\"";
    let start = headers.find(marker)? + marker.len();
    let rest = &headers[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn parse_multipart(body: &str, boundary: &str, mail: &mut Mail) {
    let delimiter = format!("--{boundary}");

    for part in body.split(delimiter.as_str()) {
        if part.contains("Content-Type: text/plain") {
            if let Some(text) = part_payload(part) {
                // Last text/plain part wins.
                mail.text_body = Some(text.trim().to_string());
            }
        } else if part.contains("Content-Disposition: attachment") {
            if !part.contains("Content-Transfer-Encoding: base64") {
                continue;
            }
            let Some(payload) = part_payload(part) else {
                continue;
            };
            let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
            let Ok(bytes) = BASE64.decode(compact.as_bytes()) else {
                continue;
            };
            let name = attachment_filename(part)
                .unwrap_or_else(|| format!("attachment-{}", mail.attachments.len() + 1));
            insert_attachment(&mut mail.attachments, name, bytes);
        }
        // Parts matching neither marker are ignored.
    }
}

/// Everything after the blank line separating a part's headers from
/// its content.
fn part_payload(part: &str) -> Option<&str> {
    part.split_once("\n\n").map(|(_, payload)| payload)
}

/// The `filename="..."` attribute of a part's Content-Disposition.
fn attachment_filename(part: &str) -> Option<String> {
    let marker = "filename=\"";
    let start = part.find(marker)? + marker.len();
    let rest = &part[start..];
    let end = rest.find('"')?;
    let name = rest[..end].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn insert_attachment(attachments: &mut BTreeMap<String, Vec<u8>>, name: String, bytes: Vec<u8>) {
    if !attachments.contains_key(&name) {
        attachments.insert(name, bytes);
        return;
    }
    let mut suffix = 1;
    loop {
        let candidate = format!("{name}-{suffix}");
        if !attachments.contains_key(&candidate) {
            attachments.insert(candidate, bytes);
            return;
        }
        suffix += 1;
    }
}
