use async_std::channel::{Receiver, Sender};

/// Notify wraps a channel that is never sent on.
/// Closing the sender wakes every waiter at once.
#[derive(Clone)]
pub struct Notify(Sender<()>, Receiver<()>);

impl Notify {
    /// Creates a new Notify struct.
    pub fn new() -> Self {
        let (send, recv) = async_std::channel::bounded(1);
        Self(send, recv)
    }

    /// Wakes all listeners. Returns `false` if this was already notified.
    pub fn notify(&self) -> bool {
        self.0.close()
    }

    pub fn is_notified(&self) -> bool {
        self.0.is_closed()
    }

    /// Waits until [`Notify::notify`] is called.
    pub async fn wait(&self) {
        // the channel only ever errors once it is closed
        while self.1.recv().await.is_ok() {}
    }
}
