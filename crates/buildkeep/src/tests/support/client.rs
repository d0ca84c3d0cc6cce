//! Scripted daemon client.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use buildkeep_config::DaemonAddress;

use super::fixtures::{sample_info, sample_worker};
use crate::client::{
    ClientError, DaemonClient, DaemonConnection, DaemonInfo, TlsCredentials, WorkerInfo,
};

/// How the daemon answers one connection.
#[derive(Debug, Clone)]
pub enum Reply {
    /// One worker and current version info.
    Healthy,
    /// One worker; the info endpoint is not implemented.
    HealthyWithoutInfo,
    /// One worker; the info call fails outright.
    InfoFails,
    /// The daemon is up but has not registered a worker yet.
    NoWorkers,
    /// The connection is refused.
    Refused,
    /// The connection hangs for the given time before answering healthy.
    Stall(Duration),
    /// The connection opens but listing workers hangs for the given time,
    /// giving up early when the call's timeout is shorter.
    StallWorkers(Duration),
}

/// [`DaemonClient`] that answers connections from a script.
///
/// Once the script runs out every connection gets the fallback reply.
#[derive(Debug)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl ScriptedClient {
    /// Client whose daemon always answers healthy.
    pub fn healthy() -> Self {
        Self::scripted([], Reply::Healthy)
    }

    /// Client whose daemon is never reachable.
    pub fn refusing() -> Self {
        Self::scripted([], Reply::Refused)
    }

    /// Client that plays `script` and then answers with `fallback`.
    pub fn scripted(script: impl IntoIterator<Item = Reply>, fallback: Reply) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            connects: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of connections opened so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of connections dropped so far.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn open(&self, reply: Reply) -> ScriptedConnection {
        ScriptedConnection {
            reply,
            closes: Arc::clone(&self.closes),
        }
    }

    fn next_reply(&self) -> Reply {
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl DaemonClient for ScriptedClient {
    type Connection = ScriptedConnection;

    fn connect(
        &self,
        address: &DaemonAddress,
        _credentials: Option<&TlsCredentials>,
        _timeout: Duration,
    ) -> Result<Self::Connection, ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.next_reply() {
            Reply::Refused => Err(ClientError::Connect {
                address: address.to_string(),
                message: String::from("connection refused"),
            }),
            Reply::Stall(delay) => {
                thread::sleep(delay);
                Ok(self.open(Reply::Healthy))
            }
            reply => Ok(self.open(reply)),
        }
    }
}

/// Connection opened by [`ScriptedClient`].
#[derive(Debug)]
pub struct ScriptedConnection {
    reply: Reply,
    closes: Arc<AtomicUsize>,
}

impl DaemonConnection for ScriptedConnection {
    fn list_workers(&mut self, timeout: Duration) -> Result<Vec<WorkerInfo>, ClientError> {
        match self.reply {
            Reply::NoWorkers => Ok(Vec::new()),
            Reply::StallWorkers(delay) if delay > timeout => {
                thread::sleep(timeout);
                Err(ClientError::Request {
                    operation: "list_workers",
                    message: String::from("deadline exceeded"),
                })
            }
            Reply::StallWorkers(delay) => {
                thread::sleep(delay);
                Ok(vec![sample_worker()])
            }
            _ => Ok(vec![sample_worker()]),
        }
    }

    fn info(&mut self, _timeout: Duration) -> Result<DaemonInfo, ClientError> {
        match self.reply {
            Reply::HealthyWithoutInfo => Err(ClientError::Unsupported { operation: "info" }),
            Reply::InfoFails => Err(ClientError::Request {
                operation: "info",
                message: String::from("stream reset"),
            }),
            _ => Ok(sample_info()),
        }
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
