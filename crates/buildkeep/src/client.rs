//! Daemon RPC collaborator and the health facts read through it.

use std::fmt;
use std::time::{Duration, SystemTime};

use buildkeep_config::DaemonAddress;
use camino::Utf8PathBuf;
use serde::Serialize;
use thiserror::Error;

/// Sentinel reported for every version field of a daemon that predates the
/// info endpoint.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Client certificate material used for TLS connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsCredentials {
    /// Host name the server certificate must match.
    pub server_name: String,
    /// Certificate authority bundle.
    pub ca: Utf8PathBuf,
    /// Client certificate.
    pub cert: Utf8PathBuf,
    /// Client key.
    pub key: Utf8PathBuf,
}

/// Errors reported by a daemon client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The daemon does not implement the requested call.
    ///
    /// Clients must only report this for a definite "unimplemented" answer.
    /// Protocols that use the same status code for transient faults cannot
    /// tell the two apart; such clients report `Unsupported` and the caller
    /// treats the daemon as an older build.
    #[error("daemon does not support {operation}")]
    Unsupported {
        /// RPC that was rejected.
        operation: &'static str,
    },
    /// The connection could not be established.
    #[error("failed to connect to {address}: {message}")]
    Connect {
        /// Address that was dialled.
        address: String,
        /// Transport diagnostic.
        message: String,
    },
    /// A call on an open connection failed.
    #[error("{operation} failed: {message}")]
    Request {
        /// RPC that failed.
        operation: &'static str,
        /// Transport diagnostic.
        message: String,
    },
}

/// Daemon RPC operations consumed by the prober.
///
/// Implementations must be shareable with the background thread that runs
/// each probe attempt.
pub trait DaemonClient: Send + Sync + 'static {
    /// Connection handle; closed on drop.
    type Connection: DaemonConnection;

    /// Opens a connection bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the daemon cannot be reached.
    fn connect(
        &self,
        address: &DaemonAddress,
        credentials: Option<&TlsCredentials>,
        timeout: Duration,
    ) -> Result<Self::Connection, ClientError>;
}

/// Calls available on an open daemon connection.
///
/// Each call receives what is left of the attempt budget and must give up
/// once it runs out, so an abandoned attempt releases its connection instead
/// of holding it for as long as a hung daemon stays silent.
pub trait DaemonConnection {
    /// Lists the daemon's workers within `timeout`. At least one worker means
    /// healthy.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails or `timeout` elapses.
    fn list_workers(&mut self, timeout: Duration) -> Result<Vec<WorkerInfo>, ClientError>;

    /// Reads version and session information within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unsupported`] for daemons without the endpoint,
    /// and [`ClientError::Request`] when the call fails or `timeout` elapses.
    fn info(&mut self, timeout: Duration) -> Result<DaemonInfo, ClientError>;
}

/// Build of the daemon software.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaemonVersion {
    /// Package path the daemon was built from.
    pub package: String,
    /// Release version.
    pub version: String,
    /// Source revision.
    pub revision: String,
}

impl DaemonVersion {
    /// Version substituted when the daemon cannot report one.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            package: UNKNOWN_VERSION.to_owned(),
            version: UNKNOWN_VERSION.to_owned(),
            revision: UNKNOWN_VERSION.to_owned(),
        }
    }

    /// Reports whether this is the substituted sentinel.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.version == UNKNOWN_VERSION
    }
}

/// Answer to the daemon info call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaemonInfo {
    /// Daemon build.
    pub version: DaemonVersion,
    /// Build sessions currently attached.
    pub active_sessions: u32,
}

impl DaemonInfo {
    /// Info substituted for daemons that predate the info endpoint.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            version: DaemonVersion::unknown(),
            active_sessions: 0,
        }
    }
}

/// Target platform a worker can build for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Platform {
    /// Operating system.
    pub os: String,
    /// CPU architecture.
    pub architecture: String,
    /// Architecture variant such as `v7`.
    pub variant: Option<String>,
}

impl fmt::Display for Platform {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(formatter, "/{variant}")?;
        }
        Ok(())
    }
}

/// Operation slots of a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Parallelism {
    /// Operations running now.
    pub current: u32,
    /// Operations queued for a slot.
    pub waiting: u32,
    /// Slot limit.
    pub max: u32,
}

/// Garbage collection statistics of a worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcAnalytics {
    /// Cache size before the last collection, in bytes.
    pub last_size_before: u64,
    /// Bytes cleared by the last collection.
    pub last_size_cleared: u64,
    /// Start of the last completed collection.
    pub last_start: Option<SystemTime>,
    /// End of the last completed collection.
    pub last_end: Option<SystemTime>,
    /// Mean collection duration.
    pub average_duration: Duration,
    /// Time spent collecting since the daemon started.
    pub all_time_duration: Duration,
    /// Slowest collection since the daemon started.
    pub all_time_max_duration: Duration,
    /// Start of the collection in progress, if any.
    pub current_start: Option<SystemTime>,
}

impl GcAnalytics {
    /// Duration of the last completed collection, zero when unknown.
    #[must_use]
    pub fn last_duration(&self) -> Duration {
        match (self.last_start, self.last_end) {
            (Some(start), Some(end)) => end.duration_since(start).unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }
}

/// One daemon worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerInfo {
    /// Worker identifier.
    pub id: String,
    /// Supported platforms, native first.
    pub platforms: Vec<Platform>,
    /// Operation slots.
    pub parallelism: Parallelism,
    /// Garbage collection statistics.
    pub gc: GcAnalytics,
}

/// Result of a successful probe.
///
/// A snapshot always carries at least one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    info: DaemonInfo,
    primary: WorkerInfo,
    additional: Vec<WorkerInfo>,
}

impl HealthSnapshot {
    /// Builds a snapshot, returning `None` when `workers` is empty.
    #[must_use]
    pub fn from_workers(info: DaemonInfo, workers: Vec<WorkerInfo>) -> Option<Self> {
        let mut reported = workers.into_iter();
        let primary = reported.next()?;
        Some(Self {
            info,
            primary,
            additional: reported.collect(),
        })
    }

    /// Daemon version and sessions.
    #[must_use]
    pub const fn info(&self) -> &DaemonInfo {
        &self.info
    }

    /// First worker reported by the daemon.
    #[must_use]
    pub const fn primary_worker(&self) -> &WorkerInfo {
        &self.primary
    }

    /// Every reported worker, primary first.
    pub fn workers(&self) -> impl Iterator<Item = &WorkerInfo> {
        std::iter::once(&self.primary).chain(self.additional.iter())
    }

    /// Number of reported workers; never zero.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        1 + self.additional.len()
    }
}
