//! # B-Route Module
//!
//! [`BrouteModule`] owns the serial transport of one Wi-SUN radio module and
//! exposes the operations a telemetry client needs: connect to the meter,
//! run the periodic request task, receive measurements, close.

pub mod connection;
pub mod session;
pub mod telemetry;

pub use connection::{ConnectionState, Connector};
pub use session::{Session, SessionState, TerminationReason};
pub use telemetry::{receive, Reception, Transmitter};

use crate::config::{BrouteConfig, Credentials};
use crate::error::BrouteError;
use crate::skstack::{open_serial, CommandSession, ScanResult, SerialPort, SkCommand, SkTransport};
use log::{info, warn};

/// One radio module on one serial port.
pub struct BrouteModule<P: SerialPort> {
    transport: SkTransport<P>,
    config: BrouteConfig,
    credentials: Credentials,
}

impl BrouteModule<tokio_serial::SerialStream> {
    /// Open the configured serial device.
    pub fn open(config: BrouteConfig, credentials: Credentials) -> Result<Self, BrouteError> {
        config.validate()?;
        let port = open_serial(&config.device, config.baudrate)?;
        Ok(BrouteModule::new(port, config, credentials))
    }
}

impl<P: SerialPort> BrouteModule<P> {
    pub fn new(port: P, config: BrouteConfig, credentials: Credentials) -> Self {
        BrouteModule {
            transport: SkTransport::new(port),
            config,
            credentials,
        }
    }

    pub fn config(&self) -> &BrouteConfig {
        &self.config
    }

    /// Provision, scan, configure and join.
    pub async fn connect(&mut self) -> Result<Session, BrouteError> {
        Connector::new(&mut self.transport, &self.config, &self.credentials)
            .run()
            .await
    }

    /// Provision and scan, without joining.
    pub async fn scan(&mut self) -> Result<ScanResult, BrouteError> {
        Connector::new(&mut self.transport, &self.config, &self.credentials)
            .discover()
            .await
    }

    /// Start the periodic power request for `session`.
    pub fn start_transmitter(&self, session: &Session) -> Result<Transmitter, BrouteError> {
        Transmitter::spawn(
            self.transport.writer(),
            session.peer(),
            self.config.transmit_interval(),
        )
    }

    pub async fn receive(&mut self, session: &mut Session) -> Result<Reception, BrouteError> {
        receive(&mut self.transport, session).await
    }

    /// Terminate `session` if the meter has not already done so.
    pub async fn close_session(&mut self, session: &mut Session) {
        if !session.is_connected() {
            return;
        }
        info!("Terminating PANA session with {}", session.peer());
        let mut commands = CommandSession::new(&mut self.transport, self.config.command_timeout());
        if let Err(e) = commands.issue(&SkCommand::Terminate).await {
            warn!("SKTERM failed: {e}");
        }
        session.terminate(TerminationReason::Closed);
    }

    /// Release the serial port.
    pub fn close(self) {
        drop(self);
    }
}

impl<P: SerialPort> Drop for BrouteModule<P> {
    fn drop(&mut self) {
        info!("Serial port closed");
    }
}
