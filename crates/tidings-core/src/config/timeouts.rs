//! Centralized timeout configuration
//!
//! Default bounds for the provider bridge. All values can be overridden in
//! the bridge configuration file or through `TIDINGS_*` environment variables.

use std::time::Duration;

/// Default timeout values for provider requests
pub mod request {
    use super::*;

    /// Default timeout for a single tool call (60 seconds)
    pub const TOOL_CALL_SECS: u64 = 60;

    /// Get tool call timeout as Duration
    pub fn tool_call_timeout() -> Duration {
        Duration::from_secs(TOOL_CALL_SECS)
    }
}

/// Default timeout values for the readiness handshake
pub mod handshake {
    use super::*;

    /// Bound on the initialize exchange (10 seconds)
    pub const TIMEOUT_SECS: u64 = 10;

    /// How long to wait for the provider's startup banner before
    /// sending the handshake anyway (3 seconds)
    pub const BANNER_WAIT_SECS: u64 = 3;

    /// Get handshake timeout as Duration
    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }

    /// Get banner wait as Duration
    pub fn banner_wait() -> Duration {
        Duration::from_secs(BANNER_WAIT_SECS)
    }
}

/// Default readiness polling bounds used by callers waiting for `Ready`
pub mod readiness {
    use super::*;

    /// Interval between readiness checks (500 milliseconds)
    pub const POLL_INTERVAL_MILLIS: u64 = 500;

    /// Number of checks before giving up (15 seconds in total)
    pub const MAX_POLL_ATTEMPTS: u32 = 30;

    /// Get poll interval as Duration
    pub fn poll_interval() -> Duration {
        Duration::from_millis(POLL_INTERVAL_MILLIS)
    }
}

/// Default timeout values for process shutdown
pub mod shutdown {
    use super::*;

    /// Time the provider gets to exit after stdin is closed (5 seconds)
    pub const GRACE_SECS: u64 = 5;

    /// Get shutdown grace period as Duration
    pub fn grace() -> Duration {
        Duration::from_secs(GRACE_SECS)
    }
}
