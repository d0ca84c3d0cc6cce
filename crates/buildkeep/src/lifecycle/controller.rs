//! High-level orchestration of the daemon lifecycle.
//!
//! [`Lifecycle`] wires the prober, readiness waiter, and reconciler to the
//! container and daemon collaborators, exposing connect, ensure-running,
//! reset, stop, and log retrieval as single entry points.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::error::{LifecycleError, Phase};
use super::lock::StartupLock;
use super::policy::{REUSE_PROBE_TIMEOUT, RESET_TIMEOUT_MULTIPLIER, STOP_TIMEOUT, WaitTuning};
use super::probe::{ConnectionProber, Probe};
use super::readiness::{ReadinessWaiter, WaitTarget};
use super::reconcile::{Decision, Observation};
use super::run_spec;
use crate::client::{DaemonClient, HealthSnapshot};
use crate::frontend::{ContainerFrontend, ContainerInfo, ContainerStatus};
use crate::report::{self, EVENT_TARGET, ExpectedVersion, LifecycleReporter, TracingReporter};
use crate::settings::{Locality, Settings};
use crate::tls;

const BRIDGE_NETWORK: &str = "bridge";

/// Work left once the startup lock is released.
enum Pending {
    Probe,
    AwaitStart,
}

/// Lifecycle controller for one managed daemon container.
#[derive(Debug)]
pub struct Lifecycle<F, C, R = TracingReporter> {
    frontend: F,
    client: Arc<C>,
    reporter: R,
    image: String,
    container_name: String,
    expected_version: Option<ExpectedVersion>,
    tuning: WaitTuning,
}

impl<F, C> Lifecycle<F, C, TracingReporter>
where
    F: ContainerFrontend,
    C: DaemonClient,
{
    /// Builds a controller for `container_name` running `image`.
    #[must_use]
    pub fn new(
        frontend: F,
        client: Arc<C>,
        image: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            frontend,
            client,
            reporter: TracingReporter::new(),
            image: image.into(),
            container_name: container_name.into(),
            expected_version: None,
            tuning: WaitTuning::default(),
        }
    }
}

impl<F, C, R> Lifecycle<F, C, R>
where
    F: ContainerFrontend,
    C: DaemonClient,
    R: LifecycleReporter,
{
    /// Replaces the event reporter.
    #[must_use]
    pub fn with_reporter<T: LifecycleReporter>(self, reporter: T) -> Lifecycle<F, C, T> {
        Lifecycle {
            frontend: self.frontend,
            client: self.client,
            reporter,
            image: self.image,
            container_name: self.container_name,
            expected_version: self.expected_version,
            tuning: self.tuning,
        }
    }

    /// Daemon build that health notices compare against.
    #[must_use]
    pub fn with_expected_version(mut self, expected: ExpectedVersion) -> Self {
        self.expected_version = Some(expected);
        self
    }

    /// Overrides readiness timing.
    #[must_use]
    pub const fn with_tuning(mut self, tuning: WaitTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Returns a healthy daemon, starting or restarting the managed
    /// container when the daemon is local.
    ///
    /// Health notices are reported for the returned snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::RuntimeUnavailable`] for local daemons when
    /// the container runtime is missing, and any error of
    /// [`Self::ensure_running`] or [`Self::wait_for_connection`].
    pub fn connect(&self, settings: &Settings) -> Result<HealthSnapshot, LifecycleError> {
        let snapshot = match settings.locality {
            Locality::Remote => {
                self.reporter.connecting(&settings.address);
                self.wait_for_connection(settings)?
            }
            Locality::Local => {
                if !self.frontend.is_available() {
                    return Err(LifecycleError::RuntimeUnavailable {
                        binary: self.frontend.binary_name(),
                    });
                }
                self.ensure_running(settings)?
            }
        };
        self.reporter.ready(&snapshot);
        let notices = report::assess(
            &snapshot,
            self.expected_version.as_ref(),
            settings.locality,
            SystemTime::now(),
        );
        for notice in &notices {
            self.reporter.notice(notice);
        }
        Ok(snapshot)
    }

    /// Makes sure the managed daemon runs with `settings` and is healthy.
    ///
    /// A missing container is started fresh; a running one is reconciled and
    /// either reused or restarted. The startup lock, when configured, is held
    /// from the first observation until the container has been started, and
    /// released before readiness polling.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error, tagged with its phase.
    pub fn ensure_running(&self, settings: &Settings) -> Result<HealthSnapshot, LifecycleError> {
        let prober = self.prober(settings)?;
        let lock = settings
            .startup_lock_path
            .as_deref()
            .map(StartupLock::acquire)
            .transpose()?;
        let pending = self.converge(settings);
        drop(lock);
        match pending? {
            Pending::Probe => prober
                .probe(&settings.address, REUSE_PROBE_TIMEOUT)
                .map_err(|source| LifecycleError::Probe {
                    phase: Phase::Reuse,
                    source,
                }),
            Pending::AwaitStart => self.waiter().wait_until_started(
                &prober,
                &self.target(settings),
                &settings.volume_name,
                settings.timeout,
            ),
        }
    }

    /// Restarts the managed daemon with its persisted state wiped.
    ///
    /// Every wait uses twice the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ResetUnsupported`] for remote daemons before
    /// touching the container runtime, and the first failing step's error
    /// otherwise.
    pub fn reset_cache(&self, settings: &Settings) -> Result<HealthSnapshot, LifecycleError> {
        if !settings.is_local() {
            return Err(LifecycleError::ResetUnsupported {
                address: settings.address.to_string(),
            });
        }
        let mut widened = settings.clone();
        widened.timeout = widened.timeout.saturating_mul(RESET_TIMEOUT_MULTIPLIER);
        let prober = self.prober(&widened)?;
        self.reporter.resetting(&self.container_name);
        if self.is_started()? {
            self.stop()?;
            self.wait_until_stopped(widened.timeout)?;
        }
        self.start(&widened, true)?;
        self.waiter().wait_until_started(
            &prober,
            &self.target(&widened),
            &widened.volume_name,
            widened.timeout,
        )
    }

    /// Asks the runtime to stop the container, killing it after ten seconds.
    ///
    /// Does not wait for the container to exit; see
    /// [`Self::wait_until_stopped`].
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Frontend`] when the stop request fails.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        self.frontend
            .container_stop(&self.container_name, STOP_TIMEOUT)
            .map_err(LifecycleError::frontend(Phase::Stop))
    }

    /// Starts the container with `settings`, replacing an exited one.
    ///
    /// The image is pulled first when it is not available locally; pull
    /// failures are reported and the start continues.
    ///
    /// # Errors
    ///
    /// Returns TLS resolution errors and [`LifecycleError::Frontend`] for the
    /// remove and start phases.
    pub fn start(&self, settings: &Settings, reset: bool) -> Result<(), LifecycleError> {
        let fingerprint = settings.fingerprint();
        self.remove_exited()?;
        if let Err(LifecycleError::Frontend { source, .. }) = self.maybe_pull() {
            self.reporter.pull_failed(&self.image, &source);
        }
        let server_tls = tls::server_material(settings)?;
        let run = run_spec::container_run(
            &self.container_name,
            &self.image,
            settings,
            &fingerprint,
            server_tls.as_ref(),
            reset,
        );
        self.frontend
            .container_run(&run)
            .map_err(LifecycleError::frontend(Phase::Start))
    }

    /// Reports whether the container is running.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Frontend`] when the runtime cannot be queried.
    pub fn is_started(&self) -> Result<bool, LifecycleError> {
        Ok(self
            .inspect(Phase::CheckStarted)?
            .is_some_and(|info| info.is_running()))
    }

    /// Removes a stopped container left over under the managed name.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Frontend`] when lookup or removal fails.
    pub fn remove_exited(&self) -> Result<(), LifecycleError> {
        match self.inspect(Phase::Remove)? {
            Some(info) if info.status != ContainerStatus::Missing => self
                .frontend
                .container_remove(&self.container_name, false)
                .map_err(LifecycleError::frontend(Phase::Remove)),
            _ => Ok(()),
        }
    }

    /// Pulls the image unless it is available locally. Returns whether a pull
    /// happened.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Frontend`] when lookup or pull fails.
    pub fn maybe_pull(&self) -> Result<bool, LifecycleError> {
        let present = self
            .frontend
            .image_info(&self.image)
            .map_err(LifecycleError::frontend(Phase::Pull))?
            .is_some();
        if present {
            return Ok(false);
        }
        self.reporter.pulling(&self.image);
        self.frontend
            .image_pull(&self.image)
            .map_err(LifecycleError::frontend(Phase::Pull))?;
        Ok(true)
    }

    /// Waits for the container to run and the daemon to answer.
    ///
    /// # Errors
    ///
    /// See [`ReadinessWaiter::wait_until_started`].
    pub fn wait_until_started(&self, settings: &Settings) -> Result<HealthSnapshot, LifecycleError> {
        let prober = self.prober(settings)?;
        self.waiter().wait_until_started(
            &prober,
            &self.target(settings),
            &settings.volume_name,
            settings.timeout,
        )
    }

    /// Waits for the daemon at the settings' address to answer.
    ///
    /// # Errors
    ///
    /// See [`ReadinessWaiter::wait_for_connection`].
    pub fn wait_for_connection(
        &self,
        settings: &Settings,
    ) -> Result<HealthSnapshot, LifecycleError> {
        let prober = self.prober(settings)?;
        self.waiter()
            .wait_for_connection(&prober, &self.target(settings), settings.timeout)
    }

    /// Waits for the container to stop running.
    ///
    /// # Errors
    ///
    /// See [`ReadinessWaiter::wait_until_stopped`].
    pub fn wait_until_stopped(&self, timeout: Duration) -> Result<(), LifecycleError> {
        self.waiter()
            .wait_until_stopped(&self.container_name, timeout)
    }

    /// Bridge network address of the managed container; `None` for remote
    /// daemons or containers without a bridge address.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ContainerNotFound`] when a local container
    /// does not exist.
    pub fn container_ip(&self, settings: &Settings) -> Result<Option<IpAddr>, LifecycleError> {
        if !settings.is_local() {
            return Ok(None);
        }
        let info = self
            .inspect(Phase::ContainerIp)?
            .ok_or_else(|| LifecycleError::ContainerNotFound {
                container: self.container_name.clone(),
            })?;
        Ok(info.ips.get(BRIDGE_NETWORK).copied())
    }

    /// Output of the managed container, the first thing to read after
    /// [`LifecycleError::DaemonCrashed`]. Provided daemons have no managed
    /// container and yield an empty string without touching the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ContainerNotFound`] when a local container
    /// does not exist, and [`LifecycleError::Frontend`] when its output
    /// cannot be read.
    pub fn logs(&self, settings: &Settings) -> Result<String, LifecycleError> {
        if !settings.is_local() {
            return Ok(String::new());
        }
        self.frontend
            .container_logs(&self.container_name)
            .map_err(LifecycleError::frontend(Phase::Logs))?
            .ok_or_else(|| LifecycleError::ContainerNotFound {
                container: self.container_name.clone(),
            })
    }

    fn converge(&self, settings: &Settings) -> Result<Pending, LifecycleError> {
        let binary = self.frontend.binary_name();
        let Some(running) = self
            .inspect(Phase::CheckStarted)?
            .filter(ContainerInfo::is_running)
        else {
            self.reporter.starting(&binary, &self.container_name);
            self.start(settings, false)?;
            return Ok(Pending::AwaitStart);
        };
        self.reporter.found_existing(&binary, &self.container_name);
        let available = self.available_image_id();
        let decision = Observation::of(&running, available.as_deref(), settings).decide();
        self.reporter.decided(decision);
        match decision {
            Decision::Reuse | Decision::ReuseUpdateInhibited => Ok(Pending::Probe),
            Decision::Restart(_) => {
                self.stop()?;
                self.wait_until_stopped(settings.timeout)?;
                self.start(settings, false)?;
                Ok(Pending::AwaitStart)
            }
        }
    }

    fn available_image_id(&self) -> Option<String> {
        self.frontend.image_info(&self.image).map_or_else(
            |error| {
                tracing::debug!(
                    target: EVENT_TARGET,
                    event = "image_lookup_failed",
                    image = %self.image,
                    error = %error,
                    "treating available image as unknown"
                );
                None
            },
            |info| info.map(|image| image.id),
        )
    }

    fn inspect(&self, phase: Phase) -> Result<Option<ContainerInfo>, LifecycleError> {
        self.frontend
            .container_info(&self.container_name)
            .map_err(LifecycleError::frontend(phase))
    }

    fn prober(&self, settings: &Settings) -> Result<ConnectionProber<C>, LifecycleError> {
        let credentials = tls::client_credentials(settings)?;
        Ok(ConnectionProber::new(Arc::clone(&self.client), credentials))
    }

    fn waiter(&self) -> ReadinessWaiter<'_> {
        ReadinessWaiter::new(&self.frontend, &self.reporter).with_tuning(self.tuning)
    }

    fn target<'a>(&'a self, settings: &'a Settings) -> WaitTarget<'a> {
        WaitTarget {
            container: &self.container_name,
            address: &settings.address,
            locality: settings.locality,
        }
    }
}
