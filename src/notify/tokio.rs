use tokio::sync::watch;

/// Notify wraps a watch channel holding whether it was notified.
pub struct Notify(watch::Sender<bool>, watch::Receiver<bool>);

impl Notify {
    /// Creates a new Notify struct.
    pub fn new() -> Self {
        let (send, recv) = watch::channel(false);
        Self(send, recv)
    }

    /// Wakes all listeners. Returns `false` if this was already notified.
    pub fn notify(&self) -> bool {
        !self.0.send_replace(true)
    }

    pub fn is_notified(&self) -> bool {
        *self.1.borrow()
    }

    /// Waits until [`Notify::notify`] is called.
    pub async fn wait(&self) {
        let mut recv = self.1.clone();
        loop {
            if *recv.borrow_and_update() {
                return;
            }
            if recv.changed().await.is_err() {
                return;
            }
        }
    }
}
