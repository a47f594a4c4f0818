/// A thin wrapper over `tracing` that keeps the two verbosity levels
/// rak-rs has always used.
///
/// `rakrs_debug!(true, ...)` marks a "heavy" message, emitted for every packet,
/// and is logged at `TRACE`. Everything else is logged at `DEBUG`.
#[macro_export]
macro_rules! rakrs_debug {
    (true, $($t: tt)*) => {
        ::tracing::trace!($($t)*)
    };
    ($($t: tt)*) => {
        ::tracing::debug!($($t)*)
    };
}
