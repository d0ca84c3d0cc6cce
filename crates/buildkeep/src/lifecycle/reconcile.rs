//! Reuse-or-restart decision for a running daemon container.

use std::fmt;

use super::run_spec::FINGERPRINT_LABEL;
use crate::frontend::ContainerInfo;
use crate::settings::Settings;

/// Why a running container has to be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// Image matches but the stored fingerprint does not.
    SettingsChanged,
    /// A different image is available, or its identity is unknown.
    ImageUpdated,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SettingsChanged => f.write_str("settings changed"),
            Self::ImageUpdated => f.write_str("updated image available"),
        }
    }
}

/// Outcome of reconciling a running container with desired settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Image and settings match; probe the running daemon.
    Reuse,
    /// A newer image exists but updates are inhibited; probe the running
    /// daemon as it is.
    ReuseUpdateInhibited,
    /// Stop, wait for exit, start, and wait until ready.
    Restart(RestartReason),
}

/// Facts compared by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// The running container's image is the desired image's current identity.
    pub image_matches: bool,
    /// The running container's stored fingerprint verifies against the
    /// desired settings.
    pub settings_match: bool,
    /// The caller opted out of automatic updates.
    pub update_inhibited: bool,
}

impl Observation {
    /// Observes `running` against the desired settings.
    ///
    /// An unknown `available_image` never matches: restarting is what fetches
    /// it.
    #[must_use]
    pub fn of(running: &ContainerInfo, available_image: Option<&str>, settings: &Settings) -> Self {
        let image_matches =
            available_image.is_some_and(|id| !id.is_empty() && id == running.image_id);
        let settings_match = running
            .labels
            .get(FINGERPRINT_LABEL)
            .is_some_and(|stored| settings.verify(stored));
        Self {
            image_matches,
            settings_match,
            update_inhibited: settings.no_update,
        }
    }

    /// Applies the decision table.
    #[must_use]
    pub const fn decide(self) -> Decision {
        match (self.image_matches, self.settings_match, self.update_inhibited) {
            (true, true, _) => Decision::Reuse,
            (true, false, _) => Decision::Restart(RestartReason::SettingsChanged),
            (false, _, true) => Decision::ReuseUpdateInhibited,
            (false, _, false) => Decision::Restart(RestartReason::ImageUpdated),
        }
    }
}
