//! In-memory container runtime that records every call.

use std::collections::{BTreeMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::frontend::{
    ContainerFrontend, ContainerInfo, ContainerRun, ContainerStatus, FrontendError, ImageInfo,
    VolumeInfo,
};
use crate::lifecycle::FINGERPRINT_LABEL;

/// Identity of the image the fake runtime has available by default.
pub const CURRENT_IMAGE_ID: &str = "sha256:current";

const BINARY: &str = "docker";

/// Calls observed by [`RecordingFrontend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendCall {
    /// `is_available`.
    IsAvailable,
    /// `container_info`.
    ContainerInfo,
    /// `container_run` with its request.
    ContainerRun(Box<ContainerRun>),
    /// `container_stop` with its kill timeout.
    ContainerStop(Duration),
    /// `container_logs`.
    ContainerLogs,
    /// `container_remove`.
    ContainerRemove,
    /// `image_info`.
    ImageInfo,
    /// `image_pull`.
    ImagePull,
    /// `volume_info`.
    VolumeInfo,
}

#[derive(Debug)]
struct State {
    available: bool,
    container: Option<ContainerInfo>,
    statuses: VecDeque<Option<ContainerStatus>>,
    image_id: Option<String>,
    status_after_run: ContainerStatus,
    stop_ignored: bool,
    inspect_fails: bool,
    inspect_panics: bool,
    pull_fails: bool,
    volume: Result<Option<u64>, ()>,
    output: String,
    calls: Vec<FrontendCall>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            available: true,
            container: None,
            statuses: VecDeque::new(),
            image_id: Some(CURRENT_IMAGE_ID.to_owned()),
            status_after_run: ContainerStatus::Running,
            stop_ignored: false,
            inspect_fails: false,
            inspect_panics: false,
            pull_fails: false,
            volume: Ok(Some(0)),
            output: String::new(),
            calls: Vec::new(),
        }
    }
}

/// [`ContainerFrontend`] simulating one runtime host.
///
/// Runs create a container carrying the requested labels, stops leave it
/// exited, and removals delete it. Clones share state so a test can keep a
/// handle after moving one into the controller.
#[derive(Debug, Clone, Default)]
pub struct RecordingFrontend {
    state: Arc<Mutex<State>>,
}

impl RecordingFrontend {
    /// Runtime with the current image available and no container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Running container labelled with `fingerprint`, created from `image_id`.
    pub fn running(fingerprint: &str, image_id: &str) -> ContainerInfo {
        ContainerInfo {
            status: ContainerStatus::Running,
            image_id: image_id.to_owned(),
            labels: BTreeMap::from([(FINGERPRINT_LABEL.to_owned(), fingerprint.to_owned())]),
            ips: BTreeMap::from([(
                String::from("bridge"),
                IpAddr::V4(Ipv4Addr::new(172, 17, 0, 2)),
            )]),
        }
    }

    /// Replaces the container known under the managed name.
    pub fn set_container(&self, container: Option<ContainerInfo>) {
        self.state().container = container;
    }

    /// Replaces the locally available image.
    pub fn set_available_image(&self, image_id: Option<&str>) {
        self.state().image_id = image_id.map(str::to_owned);
    }

    /// Makes the runtime unreachable.
    pub fn set_unavailable(&self) {
        self.state().available = false;
    }

    /// Answers the next inspections with these statuses before falling back
    /// to the simulated container. `None` reports no container.
    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = Option<ContainerStatus>>) {
        self.state().statuses.extend(statuses);
    }

    /// Makes every inspection and log read fail.
    pub fn fail_inspection(&self) {
        self.state().inspect_fails = true;
    }

    /// Makes every inspection panic.
    pub fn panic_on_inspection(&self) {
        self.state().inspect_panics = true;
    }

    /// Makes image pulls fail.
    pub fn fail_pull(&self) {
        self.state().pull_fails = true;
    }

    /// Started containers exit immediately.
    pub fn exit_on_start(&self) {
        self.state().status_after_run = ContainerStatus::Exited;
    }

    /// Stop requests leave the container running.
    pub fn ignore_stop(&self) {
        self.state().stop_ignored = true;
    }

    /// Sets the cache volume size; `None` removes the volume.
    pub fn set_volume_bytes(&self, bytes: Option<u64>) {
        self.state().volume = Ok(bytes);
    }

    /// Makes volume lookups fail.
    pub fn fail_volume(&self) {
        self.state().volume = Err(());
    }

    /// Sets what the container has written to its standard output.
    pub fn set_output(&self, output: &str) {
        self.state().output = output.to_owned();
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<FrontendCall> {
        self.state().calls.clone()
    }

    /// Every run request so far.
    pub fn runs(&self) -> Vec<ContainerRun> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                FrontendCall::ContainerRun(run) => Some(*run),
                _ => None,
            })
            .collect()
    }

    /// Number of calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&FrontendCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Number of stop requests so far.
    pub fn stops(&self) -> usize {
        self.count(|call| matches!(call, FrontendCall::ContainerStop(_)))
    }

    /// Number of run requests so far.
    pub fn starts(&self) -> usize {
        self.count(|call| matches!(call, FrontendCall::ContainerRun(_)))
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn command_error(operation: &str, message: &str) -> FrontendError {
        FrontendError::Command {
            binary: BINARY.to_owned(),
            operation: operation.to_owned(),
            message: message.to_owned(),
        }
    }
}

impl ContainerFrontend for RecordingFrontend {
    fn binary_name(&self) -> String {
        BINARY.to_owned()
    }

    fn is_available(&self) -> bool {
        let mut state = self.state();
        state.calls.push(FrontendCall::IsAvailable);
        state.available
    }

    fn container_info(&self, _name: &str) -> Result<Option<ContainerInfo>, FrontendError> {
        let panics = {
            let mut state = self.state();
            state.calls.push(FrontendCall::ContainerInfo);
            state.inspect_panics
        };
        assert!(!panics, "runtime inspection panicked");
        let mut state = self.state();
        if state.inspect_fails {
            return Err(Self::command_error("inspect", "daemon socket closed"));
        }
        if let Some(scripted) = state.statuses.pop_front() {
            return Ok(scripted.map(|status| {
                let mut info = state
                    .container
                    .clone()
                    .unwrap_or_else(|| Self::running("", CURRENT_IMAGE_ID));
                info.status = status;
                info
            }));
        }
        Ok(state.container.clone())
    }

    fn container_run(&self, run: &ContainerRun) -> Result<(), FrontendError> {
        let mut state = self.state();
        state
            .calls
            .push(FrontendCall::ContainerRun(Box::new(run.clone())));
        if state.container.is_some() {
            return Err(Self::command_error("run", "container name already in use"));
        }
        let image_id = state
            .image_id
            .clone()
            .unwrap_or_else(|| CURRENT_IMAGE_ID.to_owned());
        let mut info = Self::running("", &image_id);
        info.labels = run.labels.clone();
        info.status = state.status_after_run;
        state.container = Some(info);
        Ok(())
    }

    fn container_stop(&self, _name: &str, timeout: Duration) -> Result<(), FrontendError> {
        let mut state = self.state();
        state.calls.push(FrontendCall::ContainerStop(timeout));
        if !state.stop_ignored {
            if let Some(container) = state.container.as_mut() {
                container.status = ContainerStatus::Exited;
            }
        }
        Ok(())
    }

    fn container_logs(&self, _name: &str) -> Result<Option<String>, FrontendError> {
        let mut state = self.state();
        state.calls.push(FrontendCall::ContainerLogs);
        if state.inspect_fails {
            return Err(Self::command_error("logs", "daemon socket closed"));
        }
        Ok(state.container.as_ref().map(|_| state.output.clone()))
    }

    fn container_remove(&self, _name: &str, _force: bool) -> Result<(), FrontendError> {
        let mut state = self.state();
        state.calls.push(FrontendCall::ContainerRemove);
        state.container = None;
        Ok(())
    }

    fn image_info(&self, _reference: &str) -> Result<Option<ImageInfo>, FrontendError> {
        let mut state = self.state();
        state.calls.push(FrontendCall::ImageInfo);
        Ok(state.image_id.clone().map(|id| ImageInfo { id }))
    }

    fn image_pull(&self, _reference: &str) -> Result<(), FrontendError> {
        let mut state = self.state();
        state.calls.push(FrontendCall::ImagePull);
        if state.pull_fails {
            return Err(Self::command_error("pull", "registry unreachable"));
        }
        state.image_id = Some(CURRENT_IMAGE_ID.to_owned());
        Ok(())
    }

    fn volume_info(&self, _name: &str) -> Result<Option<VolumeInfo>, FrontendError> {
        let mut state = self.state();
        state.calls.push(FrontendCall::VolumeInfo);
        match state.volume {
            Ok(bytes) => Ok(bytes.map(|size_bytes| VolumeInfo { size_bytes })),
            Err(()) => Err(Self::command_error("volume inspect", "volume lookup failed")),
        }
    }
}
