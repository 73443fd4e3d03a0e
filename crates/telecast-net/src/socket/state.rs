//! State enum for the connection handle lifecycle.

/// Current state of a [`Connection`](crate::socket::Connection)'s handle.
///
/// The handle is either absent, open, or poisoned; no other state exists.
/// Transitions:
///
/// - `Closed → Active` via `create` (and the server/client calls built on
///   it).
/// - `Active → Closed` via `close`, which releases the OS resources.
/// - `Active → Poisoned` when a send-path failure invalidates the handle
///   *without* releasing OS resources; the connection refuses further I/O
///   until `close` or `reconnect` is called.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No OS handle is held.
    #[default]
    Closed,
    /// A valid, open OS handle is held and usable for I/O.
    Active,
    /// The handle was invalidated by a fatal send-path failure; its OS
    /// resources are still held but all I/O is refused.
    Poisoned,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Active => write!(f, "Active"),
            Self::Poisoned => write!(f, "Poisoned"),
        }
    }
}
