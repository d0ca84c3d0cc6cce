//! Structured reporting for lifecycle events and daemon health notices.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use buildkeep_config::DaemonAddress;

use crate::client::HealthSnapshot;
use crate::frontend::FrontendError;
use crate::lifecycle::{Decision, ProbeError};
use crate::settings::Locality;

/// Tracing target of every lifecycle event and health notice.
pub const EVENT_TARGET: &str = "buildkeep::lifecycle";
const HEAVY_LOAD_WAITING: u32 = 5;
const LONG_GC: Duration = Duration::from_secs(5 * 60);
const ONGOING_GC: Duration = Duration::from_secs(60);

/// Observer for lifecycle events.
///
/// Every method is advisory: reporters never change the outcome of an
/// operation.
pub trait LifecycleReporter: Send + Sync {
    /// A remote daemon is about to be contacted.
    fn connecting(&self, address: &DaemonAddress);

    /// A running managed container was found.
    fn found_existing(&self, binary: &str, container: &str);

    /// A managed container is about to be started.
    fn starting(&self, binary: &str, container: &str);

    /// The reconciler reached a decision for a running container.
    fn decided(&self, decision: Decision);

    /// The daemon image is being pulled.
    fn pulling(&self, image: &str);

    /// Pulling failed; the start continues regardless.
    fn pull_failed(&self, image: &str, error: &FrontendError);

    /// A readiness probe attempt failed and will be retried.
    fn attempt_failed(&self, attempt: u32, timeout: Duration, error: &ProbeError);

    /// The cache volume size could not be read after a failed wait.
    fn cache_size_unknown(&self, volume: &str, error: Option<&FrontendError>);

    /// A large cache earned one extended readiness window.
    fn cache_grace(&self, cache_bytes: u64, extension: Duration);

    /// The managed container is being restarted with its state wiped.
    fn resetting(&self, container: &str);

    /// The daemon answered a probe.
    fn ready(&self, snapshot: &HealthSnapshot);

    /// Advisory observation about the daemon's health.
    fn notice(&self, notice: &HealthNotice);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn connecting(&self, address: &DaemonAddress) {
        (**self).connecting(address);
    }

    fn found_existing(&self, binary: &str, container: &str) {
        (**self).found_existing(binary, container);
    }

    fn starting(&self, binary: &str, container: &str) {
        (**self).starting(binary, container);
    }

    fn decided(&self, decision: Decision) {
        (**self).decided(decision);
    }

    fn pulling(&self, image: &str) {
        (**self).pulling(image);
    }

    fn pull_failed(&self, image: &str, error: &FrontendError) {
        (**self).pull_failed(image, error);
    }

    fn attempt_failed(&self, attempt: u32, timeout: Duration, error: &ProbeError) {
        (**self).attempt_failed(attempt, timeout, error);
    }

    fn cache_size_unknown(&self, volume: &str, error: Option<&FrontendError>) {
        (**self).cache_size_unknown(volume, error);
    }

    fn cache_grace(&self, cache_bytes: u64, extension: Duration) {
        (**self).cache_grace(cache_bytes, extension);
    }

    fn resetting(&self, container: &str) {
        (**self).resetting(container);
    }

    fn ready(&self, snapshot: &HealthSnapshot) {
        (**self).ready(snapshot);
    }

    fn notice(&self, notice: &HealthNotice) {
        (**self).notice(notice);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl TracingReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for TracingReporter {
    fn connecting(&self, address: &DaemonAddress) {
        tracing::info!(
            target: EVENT_TARGET,
            event = "connecting",
            address = %address,
            "connecting to provided daemon"
        );
    }

    fn found_existing(&self, binary: &str, container: &str) {
        tracing::info!(
            target: EVENT_TARGET,
            event = "found_existing",
            binary,
            container,
            "found daemon container"
        );
    }

    fn starting(&self, binary: &str, container: &str) {
        tracing::info!(
            target: EVENT_TARGET,
            event = "starting",
            binary,
            container,
            "starting daemon container"
        );
    }

    fn decided(&self, decision: Decision) {
        match decision {
            Decision::Reuse => tracing::debug!(
                target: EVENT_TARGET,
                event = "reuse",
                "image and settings match; no restart required"
            ),
            Decision::ReuseUpdateInhibited => tracing::info!(
                target: EVENT_TARGET,
                event = "update_inhibited",
                "updated image available but update is inhibited"
            ),
            Decision::Restart(reason) => tracing::info!(
                target: EVENT_TARGET,
                event = "restart",
                reason = %reason,
                "restarting daemon container"
            ),
        }
    }

    fn pulling(&self, image: &str) {
        tracing::info!(target: EVENT_TARGET, event = "pulling", image, "pulling daemon image");
    }

    fn pull_failed(&self, image: &str, error: &FrontendError) {
        tracing::warn!(
            target: EVENT_TARGET,
            event = "pull_failed",
            image,
            error = %error,
            "image pull failed; starting anyway"
        );
    }

    fn attempt_failed(&self, attempt: u32, timeout: Duration, error: &ProbeError) {
        tracing::debug!(
            target: EVENT_TARGET,
            event = "attempt_failed",
            attempt,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "daemon not ready yet"
        );
    }

    fn cache_size_unknown(&self, volume: &str, error: Option<&FrontendError>) {
        // A missing volume has no error to report.
        let cause = error.map(ToString::to_string);
        tracing::warn!(
            target: EVENT_TARGET,
            event = "cache_size_unknown",
            volume,
            error = cause.as_deref(),
            "could not detect daemon cache size"
        );
    }

    fn cache_grace(&self, cache_bytes: u64, extension: Duration) {
        tracing::warn!(
            target: EVENT_TARGET,
            event = "cache_grace",
            cache_bytes,
            extension_secs = extension.as_secs(),
            "large daemon cache detected; waiting once more before giving up. \
             Lower cache_size_mb or cache_size_pct to shorten start-up"
        );
    }

    fn resetting(&self, container: &str) {
        tracing::info!(
            target: EVENT_TARGET,
            event = "resetting",
            container,
            "restarting daemon with cache reset"
        );
    }

    fn ready(&self, snapshot: &HealthSnapshot) {
        let version = &snapshot.info().version;
        let worker = snapshot.primary_worker();
        let platforms: Vec<String> = worker.platforms.iter().map(ToString::to_string).collect();
        tracing::info!(
            target: EVENT_TARGET,
            event = "ready",
            package = %version.package,
            version = %version.version,
            revision = %version.revision,
            platforms = ?platforms,
            sessions = snapshot.info().active_sessions,
            load = worker.parallelism.current.saturating_add(worker.parallelism.waiting),
            max_parallelism = worker.parallelism.max,
            cache_bytes = worker.gc.last_size_before,
            last_gc_ms = u64::try_from(worker.gc.last_duration().as_millis()).unwrap_or(u64::MAX),
            "daemon ready"
        );
    }

    fn notice(&self, notice: &HealthNotice) {
        match notice.level {
            NoticeLevel::Warning => tracing::warn!(
                target: EVENT_TARGET,
                event = "notice",
                kind = ?notice.kind,
                "{}",
                notice.message
            ),
            NoticeLevel::Info => tracing::info!(
                target: EVENT_TARGET,
                event = "notice",
                kind = ?notice.kind,
                "{}",
                notice.message
            ),
        }
    }
}

/// Severity of a [`HealthNotice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Worth knowing.
    Info,
    /// Likely to hurt builds.
    Warning,
}

/// What a [`HealthNotice`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// The daemon predates the info endpoint.
    UnknownVersion,
    /// The daemon was built from an unexpected package.
    ForeignPackage,
    /// The daemon version differs from the expected one.
    VersionMismatch,
    /// More than a handful of operations are queued.
    HeavyLoad,
    /// Some operations are queued.
    SignificantLoad,
    /// A collection has been running for a long time.
    LongGc,
    /// A collection is running.
    OngoingGc,
    /// Past collections were very slow.
    SlowGcHistory,
}

/// Advisory observation derived from a [`HealthSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthNotice {
    /// Severity.
    pub level: NoticeLevel,
    /// Subject.
    pub kind: NoticeKind,
    /// Operator-facing message.
    pub message: String,
}

impl HealthNotice {
    const fn new(level: NoticeLevel, kind: NoticeKind, message: String) -> Self {
        Self {
            level,
            kind,
            message,
        }
    }
}

/// Daemon build the caller was released alongside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedVersion {
    /// Package path the daemon should be built from.
    pub package: String,
    /// Version the daemon should report.
    pub version: String,
}

/// Derives advisory notices from a snapshot.
///
/// Version checks only run when `expected` is provided. A version mismatch is
/// a warning for local daemons, which should match exactly, and informational
/// for remote ones.
#[must_use]
pub fn assess(
    snapshot: &HealthSnapshot,
    expected: Option<&ExpectedVersion>,
    locality: Locality,
    now: SystemTime,
) -> Vec<HealthNotice> {
    let mut notices = Vec::new();
    let version = &snapshot.info().version;
    if version.is_unknown() {
        notices.push(HealthNotice::new(
            NoticeLevel::Warning,
            NoticeKind::UnknownVersion,
            "daemon version is unknown; it predates version reporting".to_owned(),
        ));
    } else if let Some(wanted) = expected {
        if version.package != wanted.package {
            notices.push(HealthNotice::new(
                NoticeLevel::Warning,
                NoticeKind::ForeignPackage,
                format!(
                    "daemon is built from {} rather than {}; this is not supported",
                    version.package, wanted.package
                ),
            ));
        } else if version.version != wanted.version {
            let level = match locality {
                Locality::Local => NoticeLevel::Warning,
                Locality::Remote => NoticeLevel::Info,
            };
            notices.push(HealthNotice::new(
                level,
                NoticeKind::VersionMismatch,
                format!(
                    "daemon version {} differs from expected version {}",
                    version.version, wanted.version
                ),
            ));
        }
    }

    let worker = snapshot.primary_worker();
    if worker.parallelism.waiting > HEAVY_LOAD_WAITING {
        notices.push(HealthNotice::new(
            NoticeLevel::Warning,
            NoticeKind::HeavyLoad,
            "daemon is under heavy load; performance will be affected".to_owned(),
        ));
    } else if worker.parallelism.waiting > 0 {
        notices.push(HealthNotice::new(
            NoticeLevel::Info,
            NoticeKind::SignificantLoad,
            "daemon is under significant load; performance will be affected".to_owned(),
        ));
    }

    if let Some(started) = worker.gc.current_start {
        let running = now.duration_since(started).unwrap_or_default();
        if running > LONG_GC {
            notices.push(HealthNotice::new(
                NoticeLevel::Warning,
                NoticeKind::LongGc,
                format!(
                    "garbage collection has been running for {}s",
                    running.as_secs()
                ),
            ));
        } else if running > ONGOING_GC {
            notices.push(HealthNotice::new(
                NoticeLevel::Info,
                NoticeKind::OngoingGc,
                format!("garbage collection started {}s ago", running.as_secs()),
            ));
        }
    }

    if worker.gc.all_time_max_duration > LONG_GC {
        notices.push(HealthNotice::new(
            NoticeLevel::Warning,
            NoticeKind::SlowGcHistory,
            format!(
                "some garbage collections are very slow, max duration {}s",
                worker.gc.all_time_max_duration.as_secs()
            ),
        ));
    }
    notices
}
