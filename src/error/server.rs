//! Errors returned by the [`Listener`](crate::server::Listener) api.

/// The reasons a [`Listener`](crate::server::Listener) call can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerError {
    /// The address could not be resolved or the socket could not be bound.
    AddrBindErr,
    /// `start` was called on a listener that is already serving.
    AlreadyOnline,
    /// The listener is bound but `start` has not been called yet.
    NotListening,
    /// The listener was stopped and every queued event has been drained.
    Killed,
    /// The listener was stopped, its socket is gone and it can not be started again.
    Reset,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            ServerError::AddrBindErr => "Unable to bind to address",
            ServerError::AlreadyOnline => "Listener is already serving",
            ServerError::NotListening => "Listener has not been started",
            ServerError::Killed => "Listener was stopped",
            ServerError::Reset => "Listener can not be restarted",
        };
        write!(f, "{}", reason)
    }
}

impl std::error::Error for ServerError {}
