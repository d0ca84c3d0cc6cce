//! Lifecycle management for the build daemon container.
//!
//! This module is split into focused submodules so each concern remains small and
//! testable:
//! - `probe` runs one bounded health probe on a background thread.
//! - `readiness` retries the probe with escalating budgets and watches the
//!   container for crashes and shutdown.
//! - `reconcile` decides whether a running container can be reused.
//! - `run_spec` translates settings into the container run request.
//! - `lock` serialises start-up across processes.
//! - `policy` names the timing constants.
//! - `error` captures the error surface exposed to callers.
//! - `controller` implements the connect, ensure-running, reset, and stop
//!   flows.

mod controller;
mod error;
mod lock;
mod policy;
mod probe;
mod readiness;
mod reconcile;
mod run_spec;

pub use controller::Lifecycle;
pub use error::{LifecycleError, Phase};
pub use lock::StartupLock;
pub use policy::{
    GIB, GRACE_WINDOWS, GracePolicy, LOCK_POLL_INTERVAL, LOCK_WAIT, PollPolicy,
    RESET_TIMEOUT_MULTIPLIER, REUSE_PROBE_TIMEOUT, STATUS_POLL_INTERVAL, STOP_TIMEOUT,
    TIMEOUT_ESCALATION_FACTOR, WaitTuning,
};
pub use probe::{ConnectionProber, Probe, ProbeError};
pub use readiness::{ReadinessWaiter, WaitTarget};
pub use reconcile::{Decision, Observation, RestartReason};
pub use run_spec::{
    CACHE_MOUNT_TARGET, DAEMON_PORT, FINGERPRINT_LABEL, PROFILER_CONTAINER_PORT,
    PROFILER_HOST_PORT,
};
