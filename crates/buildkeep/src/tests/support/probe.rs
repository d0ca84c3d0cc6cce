//! Probe double that answers from a queue without any I/O.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use buildkeep_config::DaemonAddress;

use super::fixtures::{sample_info, sample_worker};
use crate::client::HealthSnapshot;
use crate::lifecycle::{Probe, ProbeError};

/// [`Probe`] that records every attempt budget.
///
/// Queued outcomes are consumed in order: `true` answers healthy, `false`
/// times out. An empty queue times out.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    outcomes: Mutex<VecDeque<bool>>,
    budgets: Mutex<Vec<Duration>>,
}

impl ScriptedProbe {
    /// Probe that never succeeds.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Probe that plays `outcomes` and then fails.
    pub fn with_outcomes(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            budgets: Mutex::default(),
        }
    }

    /// Budgets of every attempt so far, in order.
    pub fn budgets(&self) -> Vec<Duration> {
        self.budgets.lock().expect("budgets lock").clone()
    }

    /// Number of attempts so far.
    pub fn attempts(&self) -> usize {
        self.budgets.lock().expect("budgets lock").len()
    }
}

impl Probe for ScriptedProbe {
    fn probe(
        &self,
        _address: &DaemonAddress,
        timeout: Duration,
    ) -> Result<HealthSnapshot, ProbeError> {
        self.budgets.lock().expect("budgets lock").push(timeout);
        let healthy = self
            .outcomes
            .lock()
            .expect("outcomes lock")
            .pop_front()
            .unwrap_or(false);
        if healthy {
            HealthSnapshot::from_workers(sample_info(), vec![sample_worker()])
                .ok_or(ProbeError::NoWorkers)
        } else {
            Err(ProbeError::Timeout { timeout })
        }
    }
}
