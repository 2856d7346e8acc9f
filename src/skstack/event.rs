//! # SKSTACK Reply and Event Lines
//!
//! Classifies the text lines the radio module emits: command replies
//! (`OK`, `FAIL ER<nn>`), numbered `EVENT`s, `EPANDESC` scan blocks and
//! `ERXUDP` datagrams.

use crate::constants::*;
use crate::error::BrouteError;
use crate::util::hex::decode_hex;

/// Meaning of an `EVENT <nn>` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    BeaconReceived,
    UdpSent,
    ScanCompleted,
    PanaFailed,
    PanaConnected,
    SessionTerminationRequested,
    SessionTerminated,
    SessionTerminationTimeout,
    SessionExpired,
    Other(u8),
}

impl From<u8> for EventKind {
    fn from(code: u8) -> Self {
        match code {
            SK_EVENT_BEACON_RECEIVED => EventKind::BeaconReceived,
            SK_EVENT_UDP_SENT => EventKind::UdpSent,
            SK_EVENT_SCAN_COMPLETED => EventKind::ScanCompleted,
            SK_EVENT_PANA_FAILED => EventKind::PanaFailed,
            SK_EVENT_PANA_CONNECTED => EventKind::PanaConnected,
            SK_EVENT_SESSION_TERMINATION_REQUESTED => EventKind::SessionTerminationRequested,
            SK_EVENT_SESSION_TERMINATED => EventKind::SessionTerminated,
            SK_EVENT_SESSION_TERMINATION_TIMEOUT => EventKind::SessionTerminationTimeout,
            SK_EVENT_SESSION_EXPIRED => EventKind::SessionExpired,
            other => EventKind::Other(other),
        }
    }
}

/// `EVENT <code> <sender> [param]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkEvent {
    pub code: u8,
    pub kind: EventKind,
    pub sender: Option<String>,
    pub param: Option<String>,
}

/// `ERXUDP <sender> <dest> <rport> <lport> <senderlla> <secured> [side] <datalen> <data>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erxudp {
    pub sender: String,
    pub dest: String,
    pub rport: u16,
    pub lport: u16,
    pub sender_lla: String,
    pub secured: bool,
    pub data: Vec<u8>,
}

/// One classified line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkLine {
    Ok,
    Fail(String),
    Event(SkEvent),
    Epandesc,
    Erxudp(Erxudp),
    /// Anything else: echoes, command values, `EPANDESC` fields
    Text(String),
}

impl SkLine {
    pub fn parse(line: &str) -> Result<SkLine, BrouteError> {
        if line == "OK" {
            return Ok(SkLine::Ok);
        }
        if let Some(code) = line.strip_prefix("FAIL ER") {
            return Ok(SkLine::Fail(code.trim().to_string()));
        }
        if line == "EPANDESC" {
            return Ok(SkLine::Epandesc);
        }
        if line.starts_with("EVENT ") {
            return parse_event(line).map(SkLine::Event);
        }
        if line.starts_with("ERXUDP ") {
            return parse_erxudp(line).map(SkLine::Erxudp);
        }
        Ok(SkLine::Text(line.to_string()))
    }
}

fn parse_event(line: &str) -> Result<SkEvent, BrouteError> {
    let mut cols = line.split_whitespace().skip(1);
    let code = cols
        .next()
        .and_then(|c| u8::from_str_radix(c, 16).ok())
        .ok_or_else(|| BrouteError::InvalidEvent(line.to_string()))?;
    Ok(SkEvent {
        code,
        kind: EventKind::from(code),
        sender: cols.next().map(str::to_string),
        param: cols.next().map(str::to_string),
    })
}

fn parse_erxudp(line: &str) -> Result<Erxudp, BrouteError> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    if cols.len() < 9 {
        return Err(BrouteError::InvalidEvent(line.to_string()));
    }
    let invalid = || BrouteError::InvalidEvent(line.to_string());
    let port = |s: &str| u16::from_str_radix(s, 16).map_err(|_| invalid());

    let datalen = usize::from_str_radix(cols[cols.len() - 2], 16).map_err(|_| invalid())?;
    let data = decode_hex(cols[cols.len() - 1])?;
    if data.len() != datalen {
        return Err(BrouteError::InvalidEvent(format!(
            "ERXUDP announces {datalen} bytes, carries {}",
            data.len()
        )));
    }

    Ok(Erxudp {
        sender: cols[1].to_string(),
        dest: cols[2].to_string(),
        rport: port(cols[3])?,
        lport: port(cols[4])?,
        sender_lla: cols[5].to_string(),
        secured: cols[6] == "1",
        data,
    })
}
