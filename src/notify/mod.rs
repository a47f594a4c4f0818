//! A one shot shutdown signal, observed by the listener's read loop.
#[cfg(feature = "async_std")]
mod async_std;

#[cfg(feature = "async_tokio")]
mod tokio;

#[cfg(feature = "async_std")]
pub use self::async_std::Notify;

#[cfg(feature = "async_tokio")]
pub use self::tokio::Notify;
