//! Container runtime collaborator.
//!
//! The controller never shells out itself. Every container, image, and volume
//! operation goes through a [`ContainerFrontend`], which concrete Docker or
//! Podman adapters implement outside this crate.

use std::collections::BTreeMap;
use std::io;
use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

/// Run state of a named container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// The runtime knows the name but reports no container behind it.
    Missing,
    /// The container is running.
    Running,
    /// The container exists but is stopped or exited.
    Exited,
}

/// Facts the runtime reports about a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Current run state.
    pub status: ContainerStatus,
    /// Identity of the image the container was created from.
    pub image_id: String,
    /// Labels attached at creation time.
    pub labels: BTreeMap<String, String>,
    /// Addresses keyed by network name.
    pub ips: BTreeMap<String, IpAddr>,
}

impl ContainerInfo {
    /// Reports whether the container is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == ContainerStatus::Running
    }
}

/// Locally available image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Image identity.
    pub id: String,
}

/// Named volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeInfo {
    /// Bytes used by the volume.
    pub size_bytes: u64,
}

/// Kind of mount attached to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// Named volume managed by the runtime.
    Volume,
    /// Host path bind mount.
    Bind,
}

/// A mount attached to a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Volume or bind.
    pub kind: MountKind,
    /// Volume name or host path.
    pub source: String,
    /// Path inside the container.
    pub target: String,
    /// Mounts read-only when set.
    pub read_only: bool,
}

/// TCP port published from the container to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Host interface the port binds to.
    pub ip: IpAddr,
    /// Port on the host.
    pub host_port: u16,
    /// Port inside the container.
    pub container_port: u16,
}

/// Everything the runtime needs to create and start the daemon container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRun {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Runs the container privileged.
    pub privileged: bool,
    /// Environment variables.
    pub env: BTreeMap<String, String>,
    /// Labels.
    pub labels: BTreeMap<String, String>,
    /// Mounts.
    pub mounts: Vec<Mount>,
    /// Published ports.
    pub ports: Vec<PortMapping>,
    /// Arguments passed verbatim to the runtime's run command.
    pub additional_args: Vec<String>,
}

/// Errors reported by a container frontend.
#[derive(Debug, Error)]
pub enum FrontendError {
    /// The runtime binary or its socket cannot be reached.
    #[error("{binary} is not available")]
    Unavailable {
        /// Runtime binary name.
        binary: String,
    },
    /// The runtime rejected a command.
    #[error("{binary} {operation} failed: {message}")]
    Command {
        /// Runtime binary name.
        binary: String,
        /// Runtime operation that failed.
        operation: String,
        /// Runtime diagnostic.
        message: String,
    },
    /// Talking to the runtime failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Container runtime operations consumed by the lifecycle controller.
///
/// Lookups return `Ok(None)` when the object does not exist so callers can
/// tell "not found" apart from transport failures.
#[cfg_attr(test, mockall::automock)]
pub trait ContainerFrontend {
    /// Runtime binary name, used in operator messages.
    fn binary_name(&self) -> String;

    /// Reports whether the runtime is installed and reachable.
    fn is_available(&self) -> bool;

    /// Looks up a container by name.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError`] when the runtime cannot be queried.
    fn container_info(&self, name: &str) -> Result<Option<ContainerInfo>, FrontendError>;

    /// Creates and starts a container.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError`] when the runtime rejects the run.
    fn container_run(&self, run: &ContainerRun) -> Result<(), FrontendError>;

    /// Gracefully stops a container, killing it after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError`] when the stop request fails.
    fn container_stop(&self, name: &str, timeout: Duration) -> Result<(), FrontendError>;

    /// Reads everything a container has written to its standard output.
    /// Returns `Ok(None)` when the container does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError`] when the runtime cannot read the output.
    fn container_logs(&self, name: &str) -> Result<Option<String>, FrontendError>;

    /// Removes a container.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError`] when removal fails.
    fn container_remove(&self, name: &str, force: bool) -> Result<(), FrontendError>;

    /// Looks up a locally available image.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError`] when the runtime cannot be queried.
    fn image_info(&self, reference: &str) -> Result<Option<ImageInfo>, FrontendError>;

    /// Pulls an image.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError`] when the pull fails.
    fn image_pull(&self, reference: &str) -> Result<(), FrontendError>;

    /// Looks up a named volume.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError`] when the runtime cannot be queried.
    fn volume_info(&self, name: &str) -> Result<Option<VolumeInfo>, FrontendError>;
}
