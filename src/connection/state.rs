/// Connection States
/// These are the states a session moves through, in order. A session never
/// moves backwards, `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    /// The session was created by `SessionInfoRequest` but the peer has not
    /// sent a `ConnectionRequest` yet.
    Unidentified,

    /// `ConnectionAccept` was sent, waiting for `NewConnection`.
    Connecting,

    /// The session is connected and ready to send and receive packets.
    /// This is the state after a `NewConnection` has been received.
    Connected,

    /// The session was removed, either by the peer or by the server.
    Disconnected,
}

impl ConnectionState {
    /// Returns whether or not the Session is available to recieve
    /// packets. Sessions in this state are:
    /// - Unidentified
    /// - Connecting
    /// - Connected
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Returns whether or not the handshake has completed.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unidentified => write!(f, "Unidentified"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}
