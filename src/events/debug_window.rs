//! Debug window resolution.
//!
//! A flag can be put in debug mode until a given time. While in debug mode, every evaluation is
//! reported verbosely. The expiry is decided against the server's clock whenever it is known, so
//! that a skewed local clock neither cuts the window short nor keeps it open.

/// Server clock reading taken from a successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerClock {
    /// Server time (epoch milliseconds) reported by the response.
    pub server_time: i64,
    /// Local time (epoch milliseconds) when the response was received.
    pub observed_at: i64,
}

impl ServerClock {
    /// Estimate the current server time by advancing the reading by the local time elapsed since
    /// it was taken. A local clock stepping backwards does not move the estimate back.
    pub fn now(&self, local_now: i64) -> i64 {
        self.server_time + (local_now - self.observed_at).max(0)
    }
}

/// The time used to decide debug window expiry: the estimated server time if a server clock
/// reading exists, or the local clock otherwise.
pub fn effective_now(server_clock: Option<ServerClock>, local_now: i64) -> i64 {
    match server_clock {
        Some(server_clock) => server_clock.now(local_now),
        None => local_now,
    }
}

/// Returns `true` if an evaluation must emit a debug event.
pub fn is_debugging(debug_events_until_date: Option<i64>, effective_now: i64) -> bool {
    debug_events_until_date.is_some_and(|until| until > effective_now)
}
