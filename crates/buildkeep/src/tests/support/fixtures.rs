//! Canned settings, timing, and daemon answers.

use std::time::Duration;

use buildkeep_config::{Config, DaemonAddress};

use crate::client::{DaemonInfo, DaemonVersion, GcAnalytics, Parallelism, Platform, WorkerInfo};
use crate::lifecycle::{GIB, GracePolicy, PollPolicy, WaitTuning};
use crate::settings::Settings;

/// Package reported by [`sample_info`].
pub const SAMPLE_PACKAGE: &str = "github.com/buildkeep/buildd";

/// Version reported by [`sample_info`].
pub const SAMPLE_VERSION: &str = "v0.4.2";

/// Millisecond-scale timing so waits finish quickly.
pub fn fast_tuning() -> WaitTuning {
    let poll = PollPolicy {
        interval: Duration::from_millis(5),
        first_attempt: Duration::from_millis(250),
    };
    WaitTuning {
        local: poll,
        remote: poll,
        status_interval: Duration::from_millis(5),
        grace: GracePolicy {
            threshold_bytes: 30 * GIB,
        },
    }
}

/// Default settings for a container-managed daemon.
pub fn local_settings() -> Settings {
    let mut settings = Settings::from_config(&Config::default()).expect("default settings");
    settings.timeout = Duration::from_secs(2);
    settings
}

/// Settings for a daemon provided on another host.
pub fn remote_settings() -> Settings {
    let config = Config {
        daemon_address: DaemonAddress::tcp("builder.internal", 8372),
        ..Config::default()
    };
    let mut settings = Settings::from_config(&config).expect("remote settings");
    settings.timeout = Duration::from_secs(2);
    settings
}

/// A healthy worker with one native platform.
pub fn sample_worker() -> WorkerInfo {
    WorkerInfo {
        id: String::from("worker-0"),
        platforms: vec![Platform {
            os: String::from("linux"),
            architecture: String::from("amd64"),
            variant: None,
        }],
        parallelism: Parallelism {
            current: 1,
            waiting: 0,
            max: 20,
        },
        gc: GcAnalytics::default(),
    }
}

/// Info answer of a current daemon.
pub fn sample_info() -> DaemonInfo {
    DaemonInfo {
        version: DaemonVersion {
            package: SAMPLE_PACKAGE.to_owned(),
            version: SAMPLE_VERSION.to_owned(),
            revision: String::from("3f2c1d0"),
        },
        active_sessions: 0,
    }
}
