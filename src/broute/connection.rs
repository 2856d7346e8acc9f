//! # Connection State Machine
//!
//! Brings the radio module from a fresh start to a joined PANA session:
//!
//! ```text
//! Idle -> Provisioned -> Scanning{n} -> Configured -> Joining -> Connected
//!                          ^      |
//!                          +------+  no channel, n < scan_retries
//! ```
//!
//! Each state has one handler; [`Connector::step`] runs the handler of the
//! current state and moves to the state it returns. Retry with delay only
//! happens while scanning. A failed join is returned to the caller.

use crate::broute::session::Session;
use crate::config::{BrouteConfig, Credentials};
use crate::error::BrouteError;
use crate::skstack::{CommandSession, EventKind, ScanCollector, ScanResult, SerialPort, SkCommand, SkLine, SkTransport};
use log::{debug, info, warn};
use std::net::Ipv6Addr;

/// Where the connection procedure currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Provisioned,
    Scanning { attempt: u32 },
    Configured(ScanResult),
    Joining { peer: Ipv6Addr },
    Connected(Ipv6Addr),
}

pub struct Connector<'a, P> {
    commands: CommandSession<'a, P>,
    config: &'a BrouteConfig,
    credentials: &'a Credentials,
    state: ConnectionState,
}

impl<'a, P: SerialPort> Connector<'a, P> {
    pub fn new(transport: &'a mut SkTransport<P>, config: &'a BrouteConfig, credentials: &'a Credentials) -> Self {
        Connector {
            commands: CommandSession::new(transport, config.command_timeout()),
            config,
            credentials,
            state: ConnectionState::Idle,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Drive the state machine until the session is joined.
    pub async fn run(mut self) -> Result<Session, BrouteError> {
        info!("Connecting to smart meter");
        loop {
            if let ConnectionState::Connected(peer) = self.state {
                info!("PANA session established with {peer}");
                return Ok(Session::new(peer));
            }
            self.step().await?;
        }
    }

    /// Provision and scan only; stops before touching the registers.
    pub async fn discover(mut self) -> Result<ScanResult, BrouteError> {
        loop {
            if let ConnectionState::Configured(scan) = &self.state {
                return Ok(scan.clone());
            }
            self.step().await?;
        }
    }

    /// Run the handler of the current state. On error the state is kept.
    pub async fn step(&mut self) -> Result<(), BrouteError> {
        let next = match self.state.clone() {
            ConnectionState::Idle => self.provision().await?,
            ConnectionState::Provisioned => ConnectionState::Scanning { attempt: 1 },
            ConnectionState::Scanning { attempt } => self.scan(attempt).await?,
            ConnectionState::Configured(scan) => self.configure(&scan).await?,
            ConnectionState::Joining { peer } => self.join(peer).await?,
            connected @ ConnectionState::Connected(_) => connected,
        };
        debug!("Connection state {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    async fn provision(&mut self) -> Result<ConnectionState, BrouteError> {
        self.commands.issue(&SkCommand::disable_echo()).await?;
        self.commands
            .issue(&SkCommand::SetPassword(self.credentials.password().to_string()))
            .await?;
        self.commands
            .issue(&SkCommand::SetRouteBId(self.credentials.id().to_string()))
            .await?;
        Ok(ConnectionState::Provisioned)
    }

    async fn scan(&mut self, attempt: u32) -> Result<ConnectionState, BrouteError> {
        info!("Active scan {attempt}/{}", self.config.scan_retries);
        match self.scan_once().await? {
            Some(result) => {
                info!(
                    "Found coordinator: channel {:02X}, PAN ID {:04X}, address {:016X}",
                    result.channel, result.pan_id, result.mac_address
                );
                Ok(ConnectionState::Configured(result))
            }
            None if attempt < self.config.scan_retries => {
                info!("No coordinator found, rescanning in {:?}", self.config.scan_retry_delay());
                tokio::time::sleep(self.config.scan_retry_delay()).await;
                Ok(ConnectionState::Scanning { attempt: attempt + 1 })
            }
            None => Err(BrouteError::ScanExhausted { attempts: attempt }),
        }
    }

    /// One `SKSCAN`, waiting for a beacon (`EVENT 20`) or the end of the
    /// scan (`EVENT 22`).
    async fn scan_once(&mut self) -> Result<Option<ScanResult>, BrouteError> {
        self.commands
            .issue(&SkCommand::ActiveScan {
                duration: self.config.scan_duration,
            })
            .await?;

        loop {
            match self.commands.next_line().await? {
                SkLine::Event(event) if event.kind == EventKind::BeaconReceived => {
                    return self.collect_scan_result().await;
                }
                SkLine::Event(event) if event.kind == EventKind::ScanCompleted => return Ok(None),
                other => debug!("Ignoring {other:?} during scan"),
            }
        }
    }

    /// Read an `EPANDESC` block up to the first non-indented line.
    async fn collect_scan_result(&mut self) -> Result<Option<ScanResult>, BrouteError> {
        let mut collector = ScanCollector::new();
        loop {
            match self.commands.next_line().await? {
                SkLine::Epandesc => continue,
                SkLine::Text(text) if text.starts_with(' ') => collector.accept(&text),
                other => {
                    debug!("Scan description ended by {other:?}");
                    break;
                }
            }
        }
        Ok(collector.finish())
    }

    async fn configure(&mut self, scan: &ScanResult) -> Result<ConnectionState, BrouteError> {
        self.commands.issue(&SkCommand::set_channel(scan.channel)).await?;
        self.commands.issue(&SkCommand::set_pan_id(scan.pan_id)).await?;

        let reply = match self
            .commands
            .issue(&SkCommand::LinkLocal64 {
                mac_address: scan.mac_address,
            })
            .await
        {
            Ok(Some(reply)) => reply,
            Ok(None) | Err(BrouteError::Timeout(_)) => {
                return Err(BrouteError::AddressDerivationFailed("no reply to SKLL64".into()))
            }
            Err(e) => return Err(e),
        };
        let peer: Ipv6Addr = reply
            .trim()
            .parse()
            .map_err(|_| BrouteError::AddressDerivationFailed(reply.clone()))?;

        if peer != scan.link_local_address() {
            warn!(
                "Module derived {peer}, expected {} from the MAC address",
                scan.link_local_address()
            );
        }
        info!("Smart meter address: {peer}");
        Ok(ConnectionState::Joining { peer })
    }

    async fn join(&mut self, peer: Ipv6Addr) -> Result<ConnectionState, BrouteError> {
        info!("Starting PANA authentication with {peer}");
        self.commands.issue(&SkCommand::Join { peer }).await?;

        loop {
            match self.commands.next_line().await? {
                SkLine::Event(event) if event.kind == EventKind::PanaFailed => {
                    warn!("PANA authentication failed");
                    return Err(BrouteError::JoinFailed);
                }
                SkLine::Event(event) if event.kind == EventKind::PanaConnected => {
                    return Ok(ConnectionState::Connected(peer));
                }
                other => debug!("Ignoring {other:?} during join"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skstack::mock::MockSerialPort;

    const METER_MAC: &str = "001C6400030C12A4";
    const METER_ADDR: &str = "FE80:0000:0000:0000:021C:6400:030C:12A4";

    fn config() -> BrouteConfig {
        BrouteConfig {
            device: "/dev/null".into(),
            scan_retries: 2,
            ..BrouteConfig::default()
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("00112233445566778899AABBCCDDEEFF", "0123456789AB").unwrap()
    }

    #[tokio::test]
    async fn test_provision_then_scan_state() {
        let port = MockSerialPort::new();
        port.queue_lines(&["SKSREG SFE 0", "OK", "OK", "OK"]);
        let mut transport = SkTransport::new(port.clone());
        let (config, creds) = (config(), credentials());
        let mut connector = Connector::new(&mut transport, &config, &creds);

        connector.step().await.unwrap();
        assert_eq!(connector.state(), &ConnectionState::Provisioned);
        connector.step().await.unwrap();
        assert_eq!(connector.state(), &ConnectionState::Scanning { attempt: 1 });
        assert_eq!(
            port.get_tx_text(),
            "SKSREG SFE 0\r\nSKSETPWD C 0123456789AB\r\nSKSETRBID 00112233445566778899AABBCCDDEEFF\r\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_exhausted() {
        let port = MockSerialPort::new();
        port.queue_lines(&["OK", "OK", "OK"]);
        for _ in 0..2 {
            port.queue_lines(&["OK", "EVENT 22 FE80:0000:0000:0000:0000:0000:0000:0001 0"]);
        }
        let mut transport = SkTransport::new(port.clone());
        let (config, creds) = (config(), credentials());

        let err = Connector::new(&mut transport, &config, &creds).run().await.unwrap_err();
        assert!(matches!(err, BrouteError::ScanExhausted { attempts: 2 }));
        assert_eq!(port.get_tx_text().matches("SKSCAN").count(), 2);
    }

    #[tokio::test]
    async fn test_address_derivation_failure() {
        let port = MockSerialPort::new();
        port.queue_lines(&["OK", "OK", "not-an-address"]);
        let mut transport = SkTransport::new(port);
        let (config, creds) = (config(), credentials());
        let mut connector = Connector::new(&mut transport, &config, &creds);
        connector.state = ConnectionState::Configured(ScanResult {
            channel: 0x21,
            channel_page: None,
            pan_id: 0x8888,
            mac_address: u64::from_str_radix(METER_MAC, 16).unwrap(),
            lqi: None,
            pair_id: None,
        });

        let err = connector.step().await.unwrap_err();
        assert!(matches!(err, BrouteError::AddressDerivationFailed(_)));
        assert!(matches!(connector.state(), ConnectionState::Configured(_)));
    }

    #[tokio::test]
    async fn test_join_failure() {
        let port = MockSerialPort::new();
        let event = format!("EVENT 24 {METER_ADDR} 0");
        port.queue_lines(&["OK", "EVENT 21 FE80:0000:0000:0000:021C:6400:030C:12A4 0 00", &event]);
        let mut transport = SkTransport::new(port);
        let (config, creds) = (config(), credentials());
        let mut connector = Connector::new(&mut transport, &config, &creds);
        connector.state = ConnectionState::Joining {
            peer: METER_ADDR.parse().unwrap(),
        };

        assert!(matches!(connector.step().await, Err(BrouteError::JoinFailed)));
    }
}
