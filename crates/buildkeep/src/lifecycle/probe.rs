//! Single bounded-time health probe of the daemon.
//!
//! Each attempt runs on its own thread and reports into a result slot that is
//! created fresh for that attempt. The caller waits on the slot until the
//! attempt budget runs out; a late attempt keeps its own slot alive through
//! the shared `Arc` and writes into it after the caller has moved on, so
//! abandoned attempts never touch state another attempt reads. Every call on
//! the connection is handed the unspent part of the budget, so the thread of
//! an abandoned attempt ends and drops its connection soon after the caller
//! stops waiting.

use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use buildkeep_config::DaemonAddress;
use thiserror::Error;

use crate::client::{
    ClientError, DaemonClient, DaemonConnection, DaemonInfo, HealthSnapshot, TlsCredentials,
};

const PROBE_THREAD_NAME: &str = "buildkeep-probe";

/// Errors raised by a single probe attempt.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The connection could not be opened.
    #[error("failed to connect: {0}")]
    Connect(#[source] ClientError),
    /// Listing workers failed.
    #[error("failed to list workers: {0}")]
    ListWorkers(#[source] ClientError),
    /// The daemon answered but has no workers yet.
    #[error("daemon reported no workers")]
    NoWorkers,
    /// Reading daemon info failed for a reason other than lack of support.
    #[error("failed to read daemon info: {0}")]
    Info(#[source] ClientError),
    /// The attempt did not report within its budget.
    #[error("probe timed out after {timeout:?}")]
    Timeout {
        /// Attempt budget.
        timeout: Duration,
    },
    /// The probe thread could not be started.
    #[error("failed to spawn probe thread: {0}")]
    Spawn(#[source] io::Error),
}

/// One bounded attempt to reach the daemon and read its health.
pub trait Probe {
    /// Probes `address`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when the daemon is unreachable, has no workers,
    /// or does not answer in time.
    fn probe(&self, address: &DaemonAddress, timeout: Duration)
    -> Result<HealthSnapshot, ProbeError>;
}

/// [`Probe`] backed by a [`DaemonClient`].
#[derive(Debug)]
pub struct ConnectionProber<C> {
    client: Arc<C>,
    credentials: Option<TlsCredentials>,
}

impl<C> ConnectionProber<C>
where
    C: DaemonClient,
{
    /// Builds a prober presenting `credentials` on every connection.
    #[must_use]
    pub const fn new(client: Arc<C>, credentials: Option<TlsCredentials>) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

type ResultSlot = Arc<(Mutex<Option<Result<HealthSnapshot, ProbeError>>>, Condvar)>;

impl<C> Probe for ConnectionProber<C>
where
    C: DaemonClient,
{
    fn probe(
        &self,
        address: &DaemonAddress,
        timeout: Duration,
    ) -> Result<HealthSnapshot, ProbeError> {
        let slot: ResultSlot = Arc::new((Mutex::new(None), Condvar::new()));
        let writer = Arc::clone(&slot);
        let client = Arc::clone(&self.client);
        let target = address.clone();
        let credentials = self.credentials.clone();

        thread::Builder::new()
            .name(PROBE_THREAD_NAME.to_owned())
            .spawn(move || {
                let outcome = attempt(client.as_ref(), &target, credentials.as_ref(), timeout);
                let (cell, ready) = &*writer;
                let mut guard = cell.lock().unwrap_or_else(PoisonError::into_inner);
                *guard = Some(outcome);
                ready.notify_one();
            })
            .map_err(ProbeError::Spawn)?;

        let (cell, ready) = &*slot;
        let locked = cell.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut guard, _) = ready
            .wait_timeout_while(locked, timeout, |outcome| outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard
            .take()
            .unwrap_or(Err(ProbeError::Timeout { timeout }))
    }
}

fn attempt<C: DaemonClient>(
    client: &C,
    address: &DaemonAddress,
    credentials: Option<&TlsCredentials>,
    timeout: Duration,
) -> Result<HealthSnapshot, ProbeError> {
    let started = Instant::now();
    let remaining = || timeout.saturating_sub(started.elapsed());
    let mut connection = client
        .connect(address, credentials, timeout)
        .map_err(ProbeError::Connect)?;
    // Workers come first: older daemons lack the info endpoint.
    let workers = connection
        .list_workers(remaining())
        .map_err(ProbeError::ListWorkers)?;
    if workers.is_empty() {
        return Err(ProbeError::NoWorkers);
    }
    let info = match connection.info(remaining()) {
        Ok(info) => info,
        Err(ClientError::Unsupported { .. }) => DaemonInfo::unknown(),
        Err(error) => return Err(ProbeError::Info(error)),
    };
    HealthSnapshot::from_workers(info, workers).ok_or(ProbeError::NoWorkers)
}
