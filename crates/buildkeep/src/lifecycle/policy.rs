//! Timing policies for polling, escalation, and grace windows.

use std::time::Duration;

use crate::settings::Locality;

/// Factor applied to the attempt timeout after every failed probe.
pub const TIMEOUT_ESCALATION_FACTOR: u32 = 2;

/// Factor applied to the operation timeout for cache resets, which also wipe
/// the daemon's persisted state.
pub const RESET_TIMEOUT_MULTIPLIER: u32 = 2;

/// Grace period the runtime gives the daemon before killing it on stop.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for the single probe that confirms a reused daemon is healthy.
pub const REUSE_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between container status checks.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Longest wait for another process to release the startup lock.
pub const LOCK_WAIT: Duration = Duration::from_secs(5 * 60);

/// Interval between startup lock attempts.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Extended readiness windows granted to daemons with large caches.
pub const GRACE_WINDOWS: u32 = 1;

/// Bytes in a gibibyte; cache thresholds are expressed in it.
pub const GIB: u64 = 1024 * 1024 * 1024;

const LARGE_CACHE: u64 = 30 * GIB;
const LARGE_CACHE_SLOW_IO: u64 = 10 * GIB;

/// Probe cadence for one locality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause before each attempt.
    pub interval: Duration,
    /// Budget of the first attempt.
    pub first_attempt: Duration,
}

impl PollPolicy {
    /// Locally managed daemons answer quickly once up.
    pub const LOCAL: Self = Self {
        interval: Duration::from_millis(200),
        first_attempt: Duration::from_millis(500),
    };

    /// Remote daemons sit behind higher-latency links.
    pub const REMOTE: Self = Self {
        interval: Duration::from_secs(1),
        first_attempt: Duration::from_secs(1),
    };

    /// Budget for the attempt following a failure of `attempt`.
    #[must_use]
    pub const fn escalate(attempt: Duration) -> Duration {
        attempt.saturating_mul(TIMEOUT_ESCALATION_FACTOR)
    }
}

/// Cache size from which a failed start earns one more readiness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePolicy {
    /// Minimum cache size, in bytes.
    pub threshold_bytes: u64,
}

impl GracePolicy {
    /// Threshold for the current host. macOS file sharing makes cold starts
    /// slower, so the threshold is lower there.
    #[must_use]
    pub const fn for_host() -> Self {
        let threshold_bytes = if cfg!(target_os = "macos") {
            LARGE_CACHE_SLOW_IO
        } else {
            LARGE_CACHE
        };
        Self { threshold_bytes }
    }

    /// Reports whether a cache of `size_bytes` qualifies.
    #[must_use]
    pub const fn applies(self, size_bytes: u64) -> bool {
        size_bytes >= self.threshold_bytes
    }
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self::for_host()
    }
}

/// Timing knobs of the readiness waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTuning {
    /// Probe cadence for local daemons.
    pub local: PollPolicy,
    /// Probe cadence for remote daemons.
    pub remote: PollPolicy,
    /// Interval between container status checks.
    pub status_interval: Duration,
    /// Large-cache grace threshold.
    pub grace: GracePolicy,
}

impl WaitTuning {
    /// Probe cadence for `locality`.
    #[must_use]
    pub const fn for_locality(&self, locality: Locality) -> PollPolicy {
        match locality {
            Locality::Local => self.local,
            Locality::Remote => self.remote,
        }
    }
}

impl Default for WaitTuning {
    fn default() -> Self {
        Self {
            local: PollPolicy::LOCAL,
            remote: PollPolicy::REMOTE,
            status_interval: STATUS_POLL_INTERVAL,
            grace: GracePolicy::for_host(),
        }
    }
}
