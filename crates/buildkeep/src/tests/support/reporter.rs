//! Reporter double capturing lifecycle events.

use std::sync::Mutex;
use std::time::Duration;

use buildkeep_config::DaemonAddress;

use crate::client::HealthSnapshot;
use crate::frontend::FrontendError;
use crate::lifecycle::{Decision, ProbeError};
use crate::report::{HealthNotice, LifecycleReporter, NoticeKind};

/// Lifecycle event observed by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    /// Remote daemon contacted.
    Connecting,
    /// Running container found.
    FoundExisting,
    /// Container start announced.
    Starting,
    /// Reconciler decision.
    Decided(Decision),
    /// Image pull started.
    Pulling,
    /// Image pull failed.
    PullFailed,
    /// Probe attempt failed with its attempt number and budget.
    AttemptFailed(u32, Duration),
    /// Cache size could not be read.
    CacheSizeUnknown,
    /// Extra readiness window granted.
    CacheGrace(u64),
    /// Cache reset started.
    Resetting,
    /// Daemon answered.
    Ready,
    /// Health notice raised.
    Notice(NoticeKind),
}

/// [`LifecycleReporter`] that keeps every event in order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingReporter {
    /// Events recorded so far.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().expect("events lock").clone()
    }

    /// Reports whether `event` was recorded.
    pub fn saw(&self, event: &RecordedEvent) -> bool {
        self.events.lock().expect("events lock").contains(event)
    }

    /// Budgets of the failed attempts, in order.
    pub fn failed_budgets(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RecordedEvent::AttemptFailed(_, budget) => Some(budget),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: RecordedEvent) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl LifecycleReporter for RecordingReporter {
    fn connecting(&self, _address: &DaemonAddress) {
        self.record(RecordedEvent::Connecting);
    }

    fn found_existing(&self, _binary: &str, _container: &str) {
        self.record(RecordedEvent::FoundExisting);
    }

    fn starting(&self, _binary: &str, _container: &str) {
        self.record(RecordedEvent::Starting);
    }

    fn decided(&self, decision: Decision) {
        self.record(RecordedEvent::Decided(decision));
    }

    fn pulling(&self, _image: &str) {
        self.record(RecordedEvent::Pulling);
    }

    fn pull_failed(&self, _image: &str, _error: &FrontendError) {
        self.record(RecordedEvent::PullFailed);
    }

    fn attempt_failed(&self, attempt: u32, timeout: Duration, _error: &ProbeError) {
        self.record(RecordedEvent::AttemptFailed(attempt, timeout));
    }

    fn cache_size_unknown(&self, _volume: &str, _error: Option<&FrontendError>) {
        self.record(RecordedEvent::CacheSizeUnknown);
    }

    fn cache_grace(&self, cache_bytes: u64, _extension: Duration) {
        self.record(RecordedEvent::CacheGrace(cache_bytes));
    }

    fn resetting(&self, _container: &str) {
        self.record(RecordedEvent::Resetting);
    }

    fn ready(&self, _snapshot: &HealthSnapshot) {
        self.record(RecordedEvent::Ready);
    }

    fn notice(&self, notice: &HealthNotice) {
        self.record(RecordedEvent::Notice(notice.kind));
    }
}
