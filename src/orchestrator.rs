//! # Orchestrator
//!
//! Runs the telemetry client forever: connect, transmit and receive until
//! the session ends, wait, connect again. Protocol errors are logged and
//! the loop carries on; only a serial port that cannot be opened at
//! startup stops it.

use crate::broute::{BrouteModule, Reception, Session};
use crate::config::{BrouteConfig, Credentials};
use crate::echonet::Measurement;
use crate::error::BrouteError;
use crate::skstack::SerialPort;
use async_trait::async_trait;
use log::{error, info, warn};
use std::future::Future;

/// Destination of decoded measurements.
#[async_trait]
pub trait MeasurementSink: Send {
    async fn record(&mut self, measurements: &[Measurement]) -> Result<(), BrouteError>;
}

pub struct Orchestrator<S> {
    config: BrouteConfig,
    credentials: Credentials,
    sink: S,
}

impl<S: MeasurementSink> Orchestrator<S> {
    pub fn new(config: BrouteConfig, credentials: Credentials, sink: S) -> Self {
        Orchestrator {
            config,
            credentials,
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run until `shutdown` completes. The open port is released on return.
    pub async fn run_until<P, F, D>(&mut self, open: F, shutdown: D) -> Result<(), BrouteError>
    where
        P: SerialPort,
        F: FnMut(&BrouteConfig) -> Result<P, BrouteError>,
        D: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run(open) => result,
            _ = shutdown => {
                info!("Shutting down");
                Ok(())
            }
        }
    }

    /// Reconnect loop. `open` is called at startup and again after a
    /// transport failure; only the startup call may end the loop.
    pub async fn run<P, F>(&mut self, mut open: F) -> Result<(), BrouteError>
    where
        P: SerialPort,
        F: FnMut(&BrouteConfig) -> Result<P, BrouteError>,
    {
        let port = open(&self.config)?;
        let mut module = Some(BrouteModule::new(port, self.config.clone(), self.credentials.clone()));

        loop {
            if module.is_none() {
                match open(&self.config) {
                    Ok(port) => {
                        module = Some(BrouteModule::new(port, self.config.clone(), self.credentials.clone()));
                    }
                    Err(e) => {
                        error!("Cannot reopen serial port: {e}");
                        tokio::time::sleep(self.config.reconnect_delay()).await;
                        continue;
                    }
                }
            }
            let Some(current) = module.as_mut() else {
                continue;
            };

            if let Err(e) = self.run_session(current).await {
                error!("Session failed: {e}");
                if e.is_transport() {
                    if let Some(broken) = module.take() {
                        broken.close();
                    }
                }
            }

            info!("Reconnecting in {:?}", self.config.reconnect_delay());
            tokio::time::sleep(self.config.reconnect_delay()).await;
        }
    }

    /// One session from connect to termination.
    async fn run_session<P: SerialPort>(&mut self, module: &mut BrouteModule<P>) -> Result<(), BrouteError> {
        let mut session = module.connect().await?;
        let transmitter = module.start_transmitter(&session)?;

        let result = self.receive_all(module, &mut session).await;

        if let Err(e) = transmitter.stop().await {
            warn!("Transmitter ended with an error: {e}");
        }
        match &result {
            Err(e) if e.is_transport() => {}
            _ => module.close_session(&mut session).await,
        }
        result
    }

    async fn receive_all<P: SerialPort>(
        &mut self,
        module: &mut BrouteModule<P>,
        session: &mut Session,
    ) -> Result<(), BrouteError> {
        loop {
            match module.receive(session).await {
                Ok(Reception::Measurements(measurements)) => {
                    if measurements.is_empty() {
                        continue;
                    }
                    if let Err(e) = self.sink.record(&measurements).await {
                        warn!("Measurements not recorded: {e}");
                    }
                }
                Ok(Reception::SessionEnded(reason)) => {
                    info!("Session with {} ended: {reason}", session.peer());
                    return Ok(());
                }
                Err(e) if e.is_protocol() => warn!("Discarding response: {e}"),
                Err(e) => return Err(e),
            }
        }
    }
}
