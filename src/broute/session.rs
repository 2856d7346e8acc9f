//! PANA session bound to the smart meter's link-local address.

use crate::skstack::EventKind;
use std::fmt;
use std::net::Ipv6Addr;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// EVENT 26: the meter asked to end the session
    PeerRequested,
    /// EVENT 27: termination handshake completed
    Completed,
    /// EVENT 28: termination handshake timed out (session is gone anyway)
    TimedOut,
    /// EVENT 29: session lifetime expired
    Expired,
    /// Closed from our side
    Closed,
}

impl TerminationReason {
    pub fn from_event(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::SessionTerminationRequested => Some(TerminationReason::PeerRequested),
            EventKind::SessionTerminated => Some(TerminationReason::Completed),
            EventKind::SessionTerminationTimeout => Some(TerminationReason::TimedOut),
            EventKind::SessionExpired => Some(TerminationReason::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TerminationReason::PeerRequested => "session termination requested by the meter",
            TerminationReason::Completed => "PANA session terminated",
            TerminationReason::TimedOut => "PANA session termination timed out, session ended",
            TerminationReason::Expired => "PANA session lifetime expired",
            TerminationReason::Closed => "session closed locally",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Terminated(TerminationReason),
}

/// A joined B-route session.
#[derive(Debug)]
pub struct Session {
    peer: Ipv6Addr,
    state: SessionState,
}

impl Session {
    pub(crate) fn new(peer: Ipv6Addr) -> Self {
        Session {
            peer,
            state: SessionState::Connected,
        }
    }

    pub fn peer(&self) -> Ipv6Addr {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub(crate) fn terminate(&mut self, reason: TerminationReason) {
        if self.is_connected() {
            self.state = SessionState::Terminated(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_termination_events() {
        assert_eq!(
            TerminationReason::from_event(EventKind::SessionTerminationRequested),
            Some(TerminationReason::PeerRequested)
        );
        assert_eq!(
            TerminationReason::from_event(EventKind::SessionExpired),
            Some(TerminationReason::Expired)
        );
        assert_eq!(TerminationReason::from_event(EventKind::PanaConnected), None);
    }

    #[test]
    fn test_first_termination_sticks() {
        let mut session = Session::new(Ipv6Addr::LOCALHOST);
        session.terminate(TerminationReason::PeerRequested);
        session.terminate(TerminationReason::Completed);
        assert_eq!(
            session.state(),
            SessionState::Terminated(TerminationReason::PeerRequested)
        );
    }
}
