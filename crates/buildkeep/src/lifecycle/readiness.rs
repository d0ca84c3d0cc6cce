//! Readiness and shutdown polling around the prober.

use std::thread;
use std::time::{Duration, Instant};

use buildkeep_config::DaemonAddress;

use super::error::{LifecycleError, Phase};
use super::policy::{GRACE_WINDOWS, PollPolicy, WaitTuning};
use super::probe::Probe;
use crate::client::HealthSnapshot;
use crate::frontend::{ContainerFrontend, ContainerStatus};
use crate::report::LifecycleReporter;
use crate::settings::Locality;

/// Daemon a readiness wait is aimed at.
#[derive(Debug, Clone, Copy)]
pub struct WaitTarget<'a> {
    /// Managed container name; only consulted for local daemons.
    pub container: &'a str,
    /// Address probed for health.
    pub address: &'a DaemonAddress,
    /// Whether the daemon is managed on this host.
    pub locality: Locality,
}

/// Deadline that tolerates budgets too large to represent as an `Instant`.
#[derive(Debug, Clone, Copy)]
struct Deadline(Option<Instant>);

impl Deadline {
    fn after(budget: Duration) -> Self {
        Self(Instant::now().checked_add(budget))
    }

    fn remaining(self) -> Option<Duration> {
        self.0.map_or(Some(Duration::MAX), |at| {
            at.checked_duration_since(Instant::now())
                .filter(|left| !left.is_zero())
        })
    }

    /// Sleeps for `interval` or until the deadline, whichever is sooner.
    /// Returns `false` once the deadline has passed.
    fn pause(self, interval: Duration) -> bool {
        let Some(left) = self.remaining() else {
            return false;
        };
        thread::sleep(interval.min(left));
        self.remaining().is_some()
    }
}

/// Polls the daemon and its container until a wait condition holds.
///
/// Attempts within one wait are strictly sequential and the attempt budget
/// only grows. The overall deadline is checked between attempts, so an
/// in-flight attempt may finish after it.
pub struct ReadinessWaiter<'a> {
    frontend: &'a dyn ContainerFrontend,
    reporter: &'a dyn LifecycleReporter,
    tuning: WaitTuning,
}

impl<'a> ReadinessWaiter<'a> {
    /// Builds a waiter with the default [`WaitTuning`].
    #[must_use]
    pub fn new(frontend: &'a dyn ContainerFrontend, reporter: &'a dyn LifecycleReporter) -> Self {
        Self {
            frontend,
            reporter,
            tuning: WaitTuning::default(),
        }
    }

    /// Overrides poll intervals, attempt budgets, and the grace threshold.
    #[must_use]
    pub const fn with_tuning(mut self, tuning: WaitTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Probes until the daemon answers or `overall` elapses.
    ///
    /// Local daemons have their container checked before every attempt. A
    /// container that stopped or vanished ends the wait with
    /// [`LifecycleError::DaemonCrashed`]. After the deadline, one final
    /// attempt runs with the escalated budget.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ConnectionFailure`] when the final attempt
    /// fails, or the crash and frontend errors described above.
    pub fn wait_for_connection(
        &self,
        probe: &dyn Probe,
        target: &WaitTarget<'_>,
        overall: Duration,
    ) -> Result<HealthSnapshot, LifecycleError> {
        let policy = self.tuning.for_locality(target.locality);
        let deadline = Deadline::after(overall);
        let mut budget = policy.first_attempt;
        let mut attempt: u32 = 0;
        while deadline.pause(policy.interval) {
            self.ensure_alive(target)?;
            attempt = attempt.saturating_add(1);
            match probe.probe(target.address, budget) {
                Ok(snapshot) => return Ok(snapshot),
                Err(error) => {
                    self.reporter.attempt_failed(attempt, budget, &error);
                    budget = PollPolicy::escalate(budget);
                }
            }
        }
        self.ensure_alive(target)?;
        probe
            .probe(target.address, budget)
            .map_err(|source| LifecycleError::ConnectionFailure {
                timeout: overall,
                source,
            })
    }

    /// Waits for a freshly started container to run, then for the daemon
    /// inside it to answer.
    ///
    /// When the connection wait times out on a local daemon whose cache
    /// volume is at least the grace threshold, one more full window is
    /// granted.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ContainerStartTimeout`] when the container
    /// never runs, [`LifecycleError::DaemonCrashed`] when it exits, and the
    /// errors of [`Self::wait_for_connection`] otherwise.
    pub fn wait_until_started(
        &self,
        probe: &dyn Probe,
        target: &WaitTarget<'_>,
        volume: &str,
        overall: Duration,
    ) -> Result<HealthSnapshot, LifecycleError> {
        self.wait_for_container(target.container, overall)?;
        let mut windows_left = GRACE_WINDOWS;
        loop {
            let error = match self.wait_for_connection(probe, target, overall) {
                Ok(snapshot) => return Ok(snapshot),
                Err(error @ LifecycleError::ConnectionFailure { .. }) => error,
                Err(error) => return Err(error),
            };
            if windows_left == 0
                || target.locality != Locality::Local
                || !self.grant_grace(volume, overall)
            {
                return Err(error);
            }
            windows_left -= 1;
        }
    }

    /// Waits until the container is no longer running.
    ///
    /// A container the runtime cannot find, or cannot report on, counts as
    /// stopped.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::StopTimeout`] when it is still running after
    /// `overall`.
    pub fn wait_until_stopped(
        &self,
        container: &str,
        overall: Duration,
    ) -> Result<(), LifecycleError> {
        let deadline = Deadline::after(overall);
        while deadline.pause(self.tuning.status_interval) {
            match self.frontend.container_info(container) {
                Ok(Some(info)) if info.is_running() => {}
                _ => return Ok(()),
            }
        }
        Err(LifecycleError::StopTimeout {
            container: container.to_owned(),
            timeout: overall,
        })
    }

    fn wait_for_container(&self, container: &str, overall: Duration) -> Result<(), LifecycleError> {
        let deadline = Deadline::after(overall);
        while deadline.pause(self.tuning.status_interval) {
            match self.frontend.container_info(container) {
                Ok(Some(info)) if info.is_running() => return Ok(()),
                Ok(Some(info)) if info.status == ContainerStatus::Exited => {
                    return Err(LifecycleError::DaemonCrashed {
                        container: container.to_owned(),
                    });
                }
                // Not created yet, or the runtime is still catching up.
                Ok(_) | Err(_) => {}
            }
        }
        Err(LifecycleError::ContainerStartTimeout {
            container: container.to_owned(),
            timeout: overall,
        })
    }

    fn ensure_alive(&self, target: &WaitTarget<'_>) -> Result<(), LifecycleError> {
        if target.locality != Locality::Local {
            return Ok(());
        }
        match self.frontend.container_info(target.container) {
            Ok(Some(info)) if info.is_running() => Ok(()),
            Ok(_) => Err(LifecycleError::DaemonCrashed {
                container: target.container.to_owned(),
            }),
            Err(source) => Err(LifecycleError::Frontend {
                phase: Phase::CheckRunning,
                source,
            }),
        }
    }

    fn grant_grace(&self, volume: &str, extension: Duration) -> bool {
        match self.frontend.volume_info(volume) {
            Ok(Some(info)) if self.tuning.grace.applies(info.size_bytes) => {
                self.reporter.cache_grace(info.size_bytes, extension);
                true
            }
            Ok(Some(_)) => false,
            Ok(None) => {
                self.reporter.cache_size_unknown(volume, None);
                false
            }
            Err(error) => {
                self.reporter.cache_size_unknown(volume, Some(&error));
                false
            }
        }
    }
}
