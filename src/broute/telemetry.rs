//! # Telemetry Loop
//!
//! Two concurrent activities share one established session:
//!
//! - the [`Transmitter`], a background task that sends the power request
//!   to the meter immediately and then once per interval, and
//! - [`receive`], which reads lines until a datagram from the ECHONET Lite
//!   port yields measurements or a termination event ends the session.
//!
//! The transmitter only ever holds the writer half of the transport, the
//! receiver the reader half.

use crate::broute::session::{Session, SessionState, TerminationReason};
use crate::constants::{ECHONET_UDP_PORT, PANA_UDP_PORT};
use crate::echonet::{decode_measurements, power_request, Frame, Measurement};
use crate::error::BrouteError;
use crate::skstack::{LineWriter, SerialPort, SkCommand, SkLine, SkTransport};
use crate::util::hex::format_hex_compact;
use log::{debug, info, warn};
use std::net::Ipv6Addr;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Outcome of one [`receive`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reception {
    /// Measurements decoded from one ECHONET Lite response (possibly empty)
    Measurements(Vec<Measurement>),
    /// The session is over
    SessionEnded(TerminationReason),
}

/// Handle to the periodic request task.
///
/// Dropping the handle cancels the task as well; [`Transmitter::stop`]
/// additionally waits until it has finished.
pub struct Transmitter {
    cancel: watch::Sender<bool>,
    task: JoinHandle<Result<(), BrouteError>>,
}

impl Transmitter {
    /// Start sending the power request to `peer`, first immediately, then
    /// every `interval`.
    pub fn spawn<P: SerialPort>(
        writer: LineWriter<P>,
        peer: Ipv6Addr,
        interval: Duration,
    ) -> Result<Self, BrouteError> {
        let request = power_request()?;
        let (cancel, cancelled) = watch::channel(false);
        let task = tokio::spawn(transmit_loop(writer, peer, interval, request, cancelled));
        Ok(Transmitter { cancel, task })
    }

    /// Cancel the task and wait for it. No request is written after this
    /// returns. A write error that ended the task early is returned here.
    pub async fn stop(self) -> Result<(), BrouteError> {
        let _ = self.cancel.send(true);
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(BrouteError::Other(format!("transmitter task failed: {e}"))),
        }
    }
}

async fn transmit_loop<P: SerialPort>(
    writer: LineWriter<P>,
    peer: Ipv6Addr,
    interval: Duration,
    request: Vec<u8>,
    mut cancelled: watch::Receiver<bool>,
) -> Result<(), BrouteError> {
    loop {
        if *cancelled.borrow() {
            break;
        }
        let command = SkCommand::SendTo {
            peer,
            payload: request.clone(),
        };
        debug!(">> {command}");
        if let Err(e) = writer.write(&command.to_bytes()).await {
            warn!("Power request could not be sent: {e}");
            return Err(e);
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = cancelled.changed() => {
                // sender gone: the handle was dropped
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Transmitter stopped");
    Ok(())
}

/// Read until the meter answers or the session ends.
///
/// Datagrams from other ports and unrelated lines are skipped. A malformed
/// datagram or frame is returned as a protocol error; the caller may keep
/// receiving. Transport errors end the session.
pub async fn receive<P: SerialPort>(
    transport: &mut SkTransport<P>,
    session: &mut Session,
) -> Result<Reception, BrouteError> {
    if let SessionState::Terminated(reason) = session.state() {
        return Ok(Reception::SessionEnded(reason));
    }

    loop {
        let line = transport.read_line().await?;
        match SkLine::parse(&line)? {
            SkLine::Erxudp(datagram) => {
                if datagram.rport != ECHONET_UDP_PORT {
                    let kind = if datagram.rport == PANA_UDP_PORT { "PANA" } else { "foreign" };
                    debug!(
                        "Skipping {kind} datagram from port {:04X} ({} bytes)",
                        datagram.rport,
                        datagram.data.len()
                    );
                    continue;
                }
                debug!("ECHONET Lite frame: {}", format_hex_compact(&datagram.data));
                let frame = Frame::decode(&datagram.data)?;
                return Ok(Reception::Measurements(decode_measurements(&frame)));
            }
            SkLine::Event(event) => match TerminationReason::from_event(event.kind) {
                Some(reason) => {
                    info!("{reason}");
                    session.terminate(reason);
                    return Ok(Reception::SessionEnded(reason));
                }
                None => debug!("Ignoring event {:02X}", event.code),
            },
            other => debug!("Ignoring {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echonet::smart_meter::Direction;
    use crate::skstack::mock::MockSerialPort;

    const METER: &str = "FE80:0000:0000:0000:021C:6400:030C:12A4";

    fn erxudp(rport: &str, data: &str) -> String {
        format!(
            "ERXUDP {METER} FE80:0000:0000:0000:021D:1290:0003:C890 {rport} 0E1A 001C6400030C12A4 1 {:04X} {data}",
            data.len() / 2
        )
    }

    #[tokio::test]
    async fn test_receive_measurements() {
        let port = MockSerialPort::new();
        port.queue_lines(&[
            "EVENT 21 FE80:0000:0000:0000:021C:6400:030C:12A4 0 00",
            "OK",
            &erxudp("02CC", "00000000"),
            &erxudp("0E1A", "1081000102880105FF017202E704000001F4E00400000010"),
        ]);
        let mut transport = SkTransport::new(port);
        let mut session = Session::new(METER.parse().unwrap());

        match receive(&mut transport, &mut session).await.unwrap() {
            Reception::Measurements(m) => {
                assert_eq!(m[0], Measurement::InstantaneousPower { watts: 500 });
                assert_eq!(
                    m[1],
                    Measurement::CumulativeEnergy {
                        direction: Direction::Forward,
                        kwh: 1.6
                    }
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_receive_termination() {
        let port = MockSerialPort::new();
        port.queue_lines(&[
            "EVENT 26 FE80:0000:0000:0000:021C:6400:030C:12A4 0",
            "EVENT 27 FE80:0000:0000:0000:021C:6400:030C:12A4 0",
        ]);
        let mut transport = SkTransport::new(port);
        let mut session = Session::new(METER.parse().unwrap());

        assert_eq!(
            receive(&mut transport, &mut session).await.unwrap(),
            Reception::SessionEnded(TerminationReason::PeerRequested)
        );
        assert!(!session.is_connected());
        // a terminated session does not read again
        assert_eq!(
            receive(&mut transport, &mut session).await.unwrap(),
            Reception::SessionEnded(TerminationReason::PeerRequested)
        );
    }

    #[tokio::test]
    async fn test_receive_malformed_frame_is_protocol_error() {
        let port = MockSerialPort::new();
        port.queue_lines(&[&erxudp("0E1A", "2081000102880105FF017200")]);
        let mut transport = SkTransport::new(port);
        let mut session = Session::new(METER.parse().unwrap());

        let err = receive(&mut transport, &mut session).await.unwrap_err();
        assert!(err.is_protocol());
        assert!(session.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transmitter_sends_immediately_then_periodically() {
        let port = MockSerialPort::new();
        let transport = SkTransport::new(port.clone());
        let peer: Ipv6Addr = METER.parse().unwrap();

        let transmitter = Transmitter::spawn(transport.writer(), peer, Duration::from_secs(60)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(port.get_tx_text().matches("SKSENDTO").count(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(port.get_tx_text().matches("SKSENDTO").count(), 2);

        transmitter.stop().await.unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(port.get_tx_text().matches("SKSENDTO").count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_transmitter_stops() {
        let port = MockSerialPort::new();
        let transport = SkTransport::new(port.clone());

        let transmitter =
            Transmitter::spawn(transport.writer(), METER.parse().unwrap(), Duration::from_secs(60)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(transmitter);
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(port.get_tx_text().matches("SKSENDTO").count(), 1);
    }
}
