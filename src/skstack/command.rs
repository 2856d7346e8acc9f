//! # Command Session
//!
//! Typed SKSTACK commands and the primitive that issues one and collects
//! its reply. Everything the connection state machine does is built from
//! [`CommandSession::issue`], which waits for whatever [`SkCommand::reply`]
//! says the command answers with, and [`CommandSession::next_line`].

use crate::constants::{
    ECHONET_UDP_PORT, SK_SCAN_CHANNEL_MASK, SK_SCAN_MODE_ACTIVE, SK_SEC_ENCRYPTED, SK_UDP_HANDLE,
};
use crate::error::BrouteError;
use crate::skstack::event::SkLine;
use crate::skstack::transport::{SerialPort, SkTransport};
use log::{debug, warn};
use std::fmt;
use std::net::Ipv6Addr;
use std::time::Duration;
use tokio::time::timeout;
use zeroize::Zeroize;

/// Commands understood by the radio module.
pub enum SkCommand {
    /// `SKSREG <reg> <value>`
    SetRegister { register: &'static str, value: String },
    /// `SKSETPWD <len> <password>`
    SetPassword(String),
    /// `SKSETRBID <id>`
    SetRouteBId(String),
    /// `SKSCAN 2 FFFFFFFF <duration>`
    ActiveScan { duration: u8 },
    /// `SKLL64 <mac>`
    LinkLocal64 { mac_address: u64 },
    /// `SKJOIN <ipv6>`
    Join { peer: Ipv6Addr },
    /// `SKSENDTO 1 <ipv6> 0E1A 1 <len> <bytes>`
    SendTo { peer: Ipv6Addr, payload: Vec<u8> },
    /// `SKTERM`
    Terminate,
}

/// What a command answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// `OK` or `FAIL ER<nn>`
    Ack,
    /// A single value line
    Value,
    /// Nothing synchronous
    None,
}

impl SkCommand {
    pub fn disable_echo() -> Self {
        SkCommand::SetRegister {
            register: "SFE",
            value: "0".into(),
        }
    }

    pub fn set_channel(channel: u8) -> Self {
        SkCommand::SetRegister {
            register: "S2",
            value: format!("{channel:02X}"),
        }
    }

    pub fn set_pan_id(pan_id: u16) -> Self {
        SkCommand::SetRegister {
            register: "S3",
            value: format!("{pan_id:04X}"),
        }
    }

    /// Synchronous reply the module sends for this command.
    pub fn reply(&self) -> Reply {
        match self {
            SkCommand::LinkLocal64 { .. } => Reply::Value,
            SkCommand::SendTo { .. } => Reply::None,
            _ => Reply::Ack,
        }
    }

    /// Command line as sent, without CRLF or binary payload.
    fn text(&self) -> String {
        match self {
            SkCommand::SetRegister { register, value } => format!("SKSREG {register} {value}"),
            SkCommand::SetPassword(password) => format!("SKSETPWD {:X} {password}", password.len()),
            SkCommand::SetRouteBId(id) => format!("SKSETRBID {id}"),
            SkCommand::ActiveScan { duration } => {
                format!("SKSCAN {SK_SCAN_MODE_ACTIVE} {SK_SCAN_CHANNEL_MASK:08X} {duration:X}")
            }
            SkCommand::LinkLocal64 { mac_address } => format!("SKLL64 {mac_address:016X}"),
            SkCommand::Join { peer } => format!("SKJOIN {}", format_ipv6(peer)),
            SkCommand::SendTo { peer, payload } => format!(
                "SKSENDTO {SK_UDP_HANDLE} {} {ECHONET_UDP_PORT:04X} {SK_SEC_ENCRYPTED} {:04X} ",
                format_ipv6(peer),
                payload.len()
            ),
            SkCommand::Terminate => "SKTERM".into(),
        }
    }

    /// Wire bytes. `SKSENDTO` carries its payload raw, without CRLF.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.text().into_bytes();
        match self {
            SkCommand::SendTo { payload, .. } => bytes.extend_from_slice(payload),
            _ => bytes.extend_from_slice(b"\r\n"),
        }
        bytes
    }
}

impl fmt::Display for SkCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkCommand::SetPassword(password) => write!(f, "SKSETPWD {:X} ********", password.len()),
            SkCommand::SendTo { payload, .. } => {
                write!(f, "{}{}", self.text(), crate::util::hex::encode_hex_upper(payload))
            }
            other => f.write_str(&other.text()),
        }
    }
}

impl Drop for SkCommand {
    fn drop(&mut self) {
        if let SkCommand::SetPassword(password) = self {
            password.zeroize();
        }
    }
}

/// Full, upper-case notation the module expects: `FE80:0000:...`.
pub fn format_ipv6(addr: &Ipv6Addr) -> String {
    addr.segments().map(|n| format!("{n:04X}")).join(":")
}

/// Issues commands over a transport and waits for their replies.
pub struct CommandSession<'a, P> {
    transport: &'a mut SkTransport<P>,
    reply_timeout: Duration,
}

impl<'a, P: SerialPort> CommandSession<'a, P> {
    pub fn new(transport: &'a mut SkTransport<P>, reply_timeout: Duration) -> Self {
        CommandSession {
            transport,
            reply_timeout,
        }
    }

    /// Write a command without waiting for anything.
    pub async fn send(&mut self, command: &SkCommand) -> Result<(), BrouteError> {
        debug!(">> {command}");
        self.transport.write(&command.to_bytes()).await
    }

    /// Send a command and wait for its reply. Returns the value line of
    /// commands answering with one, `None` otherwise. `FAIL ER<nn>` becomes
    /// [`BrouteError::CommandFailed`].
    pub async fn issue(&mut self, command: &SkCommand) -> Result<Option<String>, BrouteError> {
        self.send(command).await?;
        match command.reply() {
            Reply::Ack => self.await_ack(command).await.map(|()| None),
            Reply::Value => self.await_value(command).await.map(Some),
            Reply::None => Ok(None),
        }
    }

    async fn await_ack(&mut self, command: &SkCommand) -> Result<(), BrouteError> {
        let echo = command.text();
        let transport = &mut *self.transport;
        let wait = async {
            loop {
                let line = transport.read_line().await?;
                match SkLine::parse(&line) {
                    Ok(SkLine::Ok) => return Ok(()),
                    Ok(SkLine::Fail(code)) => {
                        return Err(BrouteError::CommandFailed {
                            command: command.to_string(),
                            code,
                        })
                    }
                    Ok(_) if line.is_empty() || line == echo => {}
                    Ok(other) => debug!("Ignoring {other:?} while waiting for OK"),
                    Err(e) => warn!("Ignoring undecodable line while waiting for OK: {e}"),
                }
            }
        };
        timeout(self.reply_timeout, wait)
            .await
            .map_err(|_| BrouteError::Timeout(command.to_string()))?
    }

    async fn await_value(&mut self, command: &SkCommand) -> Result<String, BrouteError> {
        let echo = command.text();
        let transport = &mut *self.transport;
        let wait = async {
            loop {
                let line = transport.read_line().await?;
                match SkLine::parse(&line) {
                    Ok(SkLine::Text(text)) if !text.is_empty() && text != echo => return Ok(text),
                    Ok(SkLine::Fail(code)) => {
                        return Err(BrouteError::CommandFailed {
                            command: command.to_string(),
                            code,
                        })
                    }
                    Ok(other) => debug!("Ignoring {other:?} while waiting for value"),
                    Err(e) => warn!("Ignoring undecodable line while waiting for value: {e}"),
                }
            }
        };
        timeout(self.reply_timeout, wait)
            .await
            .map_err(|_| BrouteError::Timeout(command.to_string()))?
    }

    /// Next classifiable line, without a deadline. Undecodable lines are
    /// logged and skipped.
    pub async fn next_line(&mut self) -> Result<SkLine, BrouteError> {
        loop {
            let line = self.transport.read_line().await?;
            match SkLine::parse(&line) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => warn!("Skipping line: {e}"),
            }
        }
    }
}
