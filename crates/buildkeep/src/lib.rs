//! Lifecycle controller for a containerised build daemon.
//!
//! The crate answers a single question on behalf of its callers: is the build
//! daemon running with the configuration we need? When it is not, the
//! controller starts, restarts, or resets the managed container and then waits
//! until the daemon proves it is healthy.
//!
//! - [`settings`] turns layered configuration into validated [`Settings`] and
//!   their behavioural [`Fingerprint`].
//! - [`frontend`] and [`client`] describe the container runtime and daemon
//!   RPC collaborators the controller drives.
//! - [`lifecycle`] hosts the prober, readiness waiter, reconciler, and the
//!   [`Lifecycle`] orchestrator.
//! - [`report`] surfaces lifecycle events and health notices through
//!   `tracing`.
//! - [`telemetry`] installs the process-wide subscriber with lifecycle events
//!   kept visible.

pub mod client;
pub mod frontend;
pub mod lifecycle;
pub mod report;
pub mod settings;
pub mod telemetry;
pub mod tls;

#[cfg(test)]
mod tests;

pub use client::{
    ClientError, DaemonClient, DaemonConnection, DaemonInfo, DaemonVersion, GcAnalytics,
    HealthSnapshot, Parallelism, Platform, TlsCredentials, WorkerInfo,
};
pub use frontend::{
    ContainerFrontend, ContainerInfo, ContainerRun, ContainerStatus, FrontendError, ImageInfo,
    Mount, MountKind, PortMapping, VolumeInfo,
};
pub use lifecycle::{
    ConnectionProber, Decision, FINGERPRINT_LABEL, GracePolicy, Lifecycle, LifecycleError,
    Observation, Phase, PollPolicy, Probe, ProbeError, ReadinessWaiter, RestartReason,
    StartupLock, WaitTarget, WaitTuning,
};
pub use report::{
    EVENT_TARGET, ExpectedVersion, HealthNotice, LifecycleReporter, NoticeKind, NoticeLevel,
    TracingReporter,
    assess,
};
pub use settings::{Fingerprint, Locality, Settings, SettingsError, TlsSettings};
pub use tls::{ServerTls, TlsError};
