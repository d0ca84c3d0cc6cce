//! Shared world for the lifecycle behaviour scenarios.

use std::cell::RefCell;
use std::sync::Arc;

use rstest::fixture;

use super::client::ScriptedClient;
use super::fixtures::{fast_tuning, local_settings};
use super::frontend::RecordingFrontend;
use super::reporter::RecordingReporter;
use crate::client::HealthSnapshot;
use crate::lifecycle::{Lifecycle, LifecycleError};
use crate::settings::Settings;

/// Image reference used by every scenario.
pub const IMAGE: &str = "registry.example/buildd:v0.4.2";

/// Managed container name used by every scenario.
pub const CONTAINER: &str = "buildkeep-buildd";

/// Controller type wired to the test doubles.
pub type TestLifecycle = Lifecycle<RecordingFrontend, ScriptedClient, Arc<RecordingReporter>>;

/// Doubles, settings, and the outcome of the last controller call.
pub struct LifecycleWorld {
    /// Simulated runtime.
    pub frontend: RecordingFrontend,
    /// Simulated daemon.
    pub client: Arc<ScriptedClient>,
    /// Captured events.
    pub reporter: Arc<RecordingReporter>,
    /// Settings the controller is asked to converge on.
    pub settings: Settings,
    /// Result of the last `ensure_running` call.
    pub outcome: Option<Result<HealthSnapshot, LifecycleError>>,
}

impl Default for LifecycleWorld {
    fn default() -> Self {
        Self {
            frontend: RecordingFrontend::new(),
            client: Arc::new(ScriptedClient::healthy()),
            reporter: Arc::new(RecordingReporter::default()),
            settings: local_settings(),
            outcome: None,
        }
    }
}

impl LifecycleWorld {
    /// Builds a controller sharing this world's doubles.
    pub fn lifecycle(&self) -> TestLifecycle {
        Lifecycle::new(
            self.frontend.clone(),
            Arc::clone(&self.client),
            IMAGE,
            CONTAINER,
        )
        .with_reporter(Arc::clone(&self.reporter))
        .with_tuning(fast_tuning())
    }

    /// Runs `ensure_running` and stores the outcome.
    pub fn ensure_running(&mut self) {
        let outcome = self.lifecycle().ensure_running(&self.settings);
        self.outcome = Some(outcome);
    }

    /// Returns the stored outcome, panicking when no call was made.
    pub fn outcome(&self) -> &Result<HealthSnapshot, LifecycleError> {
        self.outcome.as_ref().expect("no controller call recorded")
    }
}

#[fixture]
pub fn world() -> RefCell<LifecycleWorld> {
    RefCell::new(LifecycleWorld::default())
}
