//! Connection state machine.
//!
//! A connection moves `Init -> Connected -> Active` and falls back to `Init`
//! on disconnect. The current state lives in a `watch` channel so readers
//! never block and observers can await changes.

use std::fmt;

use serde::{Serialize, Serializer};
use tokio::sync::watch;

/// Lifecycle state of a node connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// No socket.
    #[default]
    Init = 0,
    /// Socket open, activation not yet acknowledged.
    Connected = 1,
    /// The node accepted the activation request.
    Active = 2,
}

impl ConnectionState {
    /// Numeric code used by dashboards.
    #[must_use]
    pub const fn code(self) -> u8 { self as u8 }

    /// Returns `true` when a socket is open.
    #[must_use]
    pub const fn is_connected(self) -> bool { !matches!(self, Self::Init) }

    /// Returns `true` once activation succeeded.
    #[must_use]
    pub const fn is_active(self) -> bool { matches!(self, Self::Active) }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "INIT",
            Self::Connected => "CONNECTED",
            Self::Active => "ACTIVE",
        })
    }
}

impl Serialize for ConnectionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Owner of the connection state.
///
/// Each transition method returns `true` only if it changed the state, so
/// the caller knows whether to notify observers.
#[derive(Debug)]
pub struct StateMachine {
    tx: watch::Sender<ConnectionState>,
}

impl Default for StateMachine {
    fn default() -> Self { Self::new() }
}

impl StateMachine {
    /// Start in [`ConnectionState::Init`].
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Init);
        Self { tx }
    }

    /// Current state, without blocking.
    #[must_use]
    pub fn current(&self) -> ConnectionState { *self.tx.borrow() }

    /// Receiver that observes every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> { self.tx.subscribe() }

    /// `Init -> Connected`.
    pub fn connected(&self) -> bool {
        self.advance(ConnectionState::Init, ConnectionState::Connected)
    }

    /// `Connected -> Active`.
    pub fn activated(&self) -> bool {
        self.advance(ConnectionState::Connected, ConnectionState::Active)
    }

    /// Any state `-> Init`.
    pub fn disconnected(&self) -> bool {
        self.tx.send_if_modified(|state| {
            let changed = state.is_connected();
            *state = ConnectionState::Init;
            changed
        })
    }

    fn advance(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectionState, StateMachine};

    #[test]
    fn walks_the_happy_path() {
        let machine = StateMachine::new();
        assert_eq!(machine.current(), ConnectionState::Init);

        assert!(machine.connected());
        assert_eq!(machine.current(), ConnectionState::Connected);

        assert!(machine.activated());
        assert_eq!(machine.current(), ConnectionState::Active);

        assert!(machine.disconnected());
        assert_eq!(machine.current(), ConnectionState::Init);
    }

    #[test]
    fn rejects_out_of_order_transitions() {
        let machine = StateMachine::new();

        assert!(!machine.activated(), "cannot activate without a socket");
        assert!(!machine.disconnected(), "disconnect from Init is a no-op");

        assert!(machine.connected());
        assert!(!machine.connected(), "second connect is a no-op");
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let machine = StateMachine::new();
        let mut rx = machine.subscribe();

        machine.connected();
        rx.changed().await.expect("sender alive");

        assert_eq!(*rx.borrow(), ConnectionState::Connected);
    }

    #[test]
    fn serialises_as_numeric_code() {
        let json = serde_json::to_string(&ConnectionState::Active).expect("serialise state");
        assert_eq!(json, "2");
    }
}
