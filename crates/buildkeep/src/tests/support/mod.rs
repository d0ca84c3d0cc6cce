//! Test doubles and fixtures shared by the lifecycle suites.

mod client;
mod fixtures;
mod frontend;
mod lifecycle_world;
mod probe;
mod reporter;

pub use client::{Reply, ScriptedClient};
pub use fixtures::{
    SAMPLE_PACKAGE, SAMPLE_VERSION, fast_tuning, local_settings, remote_settings, sample_info,
    sample_worker,
};
pub use frontend::{CURRENT_IMAGE_ID, FrontendCall, RecordingFrontend};
pub use lifecycle_world::{CONTAINER, IMAGE, LifecycleWorld, world};
pub use probe::ScriptedProbe;
pub use reporter::{RecordedEvent, RecordingReporter};
