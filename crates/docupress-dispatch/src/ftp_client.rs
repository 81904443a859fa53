// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minimal FTP client (RFC 959) for printer delivery.
//
// Office printers with an FTP print service accept a plain login followed by
// one binary STOR per file; the stored filename is what triggers finishing
// options on the device. Only the small command subset needed for that flow
// is implemented: USER/PASS, TYPE I, PASV, STOR, QUIT.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use docupress_core::error::{DocupressError, Result};

/// Default FTP control port.
pub const FTP_PORT: u16 = 21;

/// One server reply: a three-digit code plus its (possibly multi-line) text.
#[derive(Debug)]
struct Reply {
    code: u16,
    text: String,
}

/// An open FTP control session.
pub struct FtpSession {
    ctrl: BufReader<TcpStream>,
    addr: String,
    connect_timeout: Duration,
}

impl FtpSession {
    /// Open the control connection with a bounded connect timeout and
    /// consume the server greeting.
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        info!(addr = %addr, "connecting to printer via FTP");

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                DocupressError::Transfer(format!(
                    "FTP connection to {} timed out after {}s",
                    addr,
                    connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| DocupressError::Transfer(format!("FTP connect to {}: {}", addr, e)))?;

        let mut session = Self {
            ctrl: BufReader::new(stream),
            addr,
            connect_timeout,
        };

        let greeting = session.read_reply().await?;
        if greeting.code != 220 {
            return Err(DocupressError::Transfer(format!(
                "unexpected FTP greeting: {} {}",
                greeting.code, greeting.text
            )));
        }
        Ok(session)
    }

    /// Log in and switch to binary mode. An empty password is permitted
    /// (anonymous-style access on many printer FTP services).
    pub async fn login(&mut self, user: &str, password: &str) -> Result<()> {
        let reply = self.command(&format!("USER {}", user)).await?;
        match reply.code {
            230 => {}
            331 => {
                let reply = self.command(&format!("PASS {}", password)).await?;
                if reply.code != 230 {
                    return Err(DocupressError::LoginRejected(format!(
                        "{} {}",
                        reply.code, reply.text
                    )));
                }
            }
            _ => {
                return Err(DocupressError::LoginRejected(format!(
                    "{} {}",
                    reply.code, reply.text
                )));
            }
        }
        info!(addr = %self.addr, user, "FTP login accepted");

        let reply = self.command("TYPE I").await?;
        if reply.code != 200 {
            return Err(DocupressError::Transfer(format!(
                "TYPE I rejected: {} {}",
                reply.code, reply.text
            )));
        }
        Ok(())
    }

    /// Store one file under `remote_name` via a passive-mode data connection.
    pub async fn store(&mut self, remote_name: &str, data: &[u8]) -> Result<()> {
        let reply = self.command("PASV").await?;
        if reply.code != 227 {
            return Err(DocupressError::Transfer(format!(
                "PASV rejected: {} {}",
                reply.code, reply.text
            )));
        }
        let data_addr = parse_pasv(&reply.text).ok_or_else(|| {
            DocupressError::Transfer(format!("unparseable PASV reply: {}", reply.text))
        })?;

        let mut data_stream =
            tokio::time::timeout(self.connect_timeout, TcpStream::connect(&data_addr))
                .await
                .map_err(|_| {
                    DocupressError::Transfer(format!("FTP data connection to {} timed out", data_addr))
                })?
                .map_err(|e| {
                    DocupressError::Transfer(format!("FTP data connect to {}: {}", data_addr, e))
                })?;

        let reply = self.command(&format!("STOR {}", remote_name)).await?;
        if reply.code != 150 && reply.code != 125 {
            return Err(DocupressError::Transfer(format!(
                "STOR {} rejected: {} {}",
                remote_name, reply.code, reply.text
            )));
        }

        data_stream
            .write_all(data)
            .await
            .map_err(|e| DocupressError::Transfer(format!("FTP data send: {e}")))?;
        data_stream
            .shutdown()
            .await
            .map_err(|e| DocupressError::Transfer(format!("FTP data shutdown: {e}")))?;
        drop(data_stream);

        let done = self.read_reply().await?;
        if done.code != 226 && done.code != 250 {
            return Err(DocupressError::Transfer(format!(
                "transfer of {} not confirmed: {} {}",
                remote_name, done.code, done.text
            )));
        }

        debug!(remote = remote_name, bytes = data.len(), "file stored");
        Ok(())
    }

    /// Close the session. Errors are swallowed — the transfer outcome has
    /// already been decided by the time QUIT is sent.
    pub async fn quit(mut self) {
        if self.command("QUIT").await.is_err() {
            warn!(addr = %self.addr, "FTP session did not close cleanly");
        }
    }

    async fn command(&mut self, cmd: &str) -> Result<Reply> {
        self.ctrl
            .get_mut()
            .write_all(format!("{}\r\n", cmd).as_bytes())
            .await
            .map_err(|e| DocupressError::Transfer(format!("FTP command write: {e}")))?;
        self.read_reply().await
    }

    /// Read one reply, following RFC 959 multi-line framing: a reply that
    /// opens with `ddd-` runs until a line opening with `ddd<space>`.
    async fn read_reply(&mut self) -> Result<Reply> {
        let first = self.read_line().await?;
        let code = parse_code(&first)
            .ok_or_else(|| DocupressError::Transfer(format!("malformed FTP reply: {first}")))?;

        let mut text = first.trim_end().to_string();
        if first.as_bytes().get(3) == Some(&b'-') {
            let terminator = format!("{} ", code);
            loop {
                let line = self.read_line().await?;
                let done = line.starts_with(&terminator);
                text.push('\n');
                text.push_str(line.trim_end());
                if done {
                    break;
                }
            }
        }
        Ok(Reply { code, text })
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self
            .ctrl
            .read_line(&mut line)
            .await
            .map_err(|e| DocupressError::Transfer(format!("FTP reply read: {e}")))?;
        if n == 0 {
            return Err(DocupressError::Transfer(
                "FTP control connection closed by printer".into(),
            ));
        }
        Ok(line)
    }
}

/// Extract the three-digit reply code from the start of a reply line.
fn parse_code(line: &str) -> Option<u16> {
    let digits = line.get(..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parse a 227 reply into a `host:port` data address.
///
/// The payload is six comma-separated numbers, conventionally inside
/// parentheses: `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`.
fn parse_pasv(text: &str) -> Option<String> {
    let numbers: Vec<u32> = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    // skip the leading "227" reply code
    let fields = numbers.strip_prefix(&[227])?;
    if fields.len() != 6 || fields.iter().any(|&n| n > 255) {
        return None;
    }
    let port = fields[4] * 256 + fields[5];
    Some(format!(
        "{}.{}.{}.{}:{}",
        fields[0], fields[1], fields[2], fields[3], port
    ))
}
