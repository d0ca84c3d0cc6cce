//! Error types for daemon lifecycle operations.

use std::fmt;
use std::io;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use super::probe::ProbeError;
use crate::frontend::FrontendError;
use crate::settings::SettingsError;
use crate::tls::TlsError;

/// Step of a lifecycle operation, attached to collaborator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Checking whether the container is started.
    CheckStarted,
    /// Confirming the container is still running during a readiness wait.
    CheckRunning,
    /// Stopping the container.
    Stop,
    /// Creating and starting the container.
    Start,
    /// Removing an exited container.
    Remove,
    /// Looking up or pulling the daemon image.
    Pull,
    /// Probing a reused daemon.
    Reuse,
    /// Reading the container's network address.
    ContainerIp,
    /// Reading the container's output.
    Logs,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CheckStarted => "check started",
            Self::CheckRunning => "check running",
            Self::Stop => "stop",
            Self::Start => "start",
            Self::Remove => "remove exited",
            Self::Pull => "pull",
            Self::Reuse => "reuse",
            Self::ContainerIp => "container ip",
            Self::Logs => "logs",
        };
        f.write_str(label)
    }
}

/// Errors raised while executing lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The container runtime is missing or unreachable.
    #[error(
        "{binary} is not available; check that it is installed and running and that you are in any required groups"
    )]
    RuntimeUnavailable {
        /// Runtime binary name.
        binary: String,
    },
    /// The managed container stopped or vanished while being waited on.
    #[error("daemon container {container} crashed")]
    DaemonCrashed {
        /// Managed container name.
        container: String,
    },
    /// The final readiness attempt failed.
    #[error("daemon did not respond within {timeout:?}: {source}")]
    ConnectionFailure {
        /// Overall wait budget.
        timeout: Duration,
        /// Failure of the final attempt.
        #[source]
        source: ProbeError,
    },
    /// Provided daemons cannot have their state wiped.
    #[error("cannot reset the cache of provided daemon {address}")]
    ResetUnsupported {
        /// Address of the provided daemon.
        address: String,
    },
    /// Another process held the startup lock for too long.
    #[error("timed out after {wait:?} waiting for another process to release {path}")]
    LockTimeout {
        /// Lock file.
        path: Utf8PathBuf,
        /// Time spent waiting.
        wait: Duration,
    },
    /// The startup lock file could not be opened or locked.
    #[error("failed to lock {path}: {source}")]
    Lock {
        /// Lock file.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A container runtime call failed.
    #[error("{phase} failed: {source}")]
    Frontend {
        /// Step that issued the call.
        phase: Phase,
        /// Runtime error.
        #[source]
        source: FrontendError,
    },
    /// The started container never reached the running state.
    #[error("daemon container {container} did not start within {timeout:?}")]
    ContainerStartTimeout {
        /// Managed container name.
        container: String,
        /// Wait budget.
        timeout: Duration,
    },
    /// The container kept running after a stop request.
    #[error("daemon container {container} did not stop within {timeout:?}")]
    StopTimeout {
        /// Managed container name.
        container: String,
        /// Wait budget.
        timeout: Duration,
    },
    /// No container exists under the managed name.
    #[error("daemon container {container} was not found")]
    ContainerNotFound {
        /// Managed container name.
        container: String,
    },
    /// A single health check outside a readiness wait failed.
    #[error("{phase} probe failed: {source}")]
    Probe {
        /// Step that ran the check.
        phase: Phase,
        /// Failure of the check.
        #[source]
        source: ProbeError,
    },
    /// The configuration did not validate.
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// TLS material could not be resolved.
    #[error("failed to resolve TLS material: {0}")]
    Tls(#[from] TlsError),
}

impl LifecycleError {
    pub(crate) fn frontend(phase: Phase) -> impl FnOnce(FrontendError) -> Self {
        move |source| Self::Frontend { phase, source }
    }
}
