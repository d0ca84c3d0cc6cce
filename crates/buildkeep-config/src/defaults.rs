//! Built-in configuration defaults.

use camino::Utf8PathBuf;

use crate::address::DaemonAddress;
use crate::choices::LogFormat;

/// Image started when no override is configured.
pub const DEFAULT_IMAGE: &str = "docker.io/buildkeep/buildd:latest";

/// Name given to the managed daemon container.
pub const DEFAULT_CONTAINER_NAME: &str = "buildkeep-buildd";

/// Volume holding the daemon's persisted cache.
pub const DEFAULT_VOLUME_NAME: &str = "buildkeep-cache";

/// Default daemon parallelism limit.
pub const DEFAULT_MAX_PARALLELISM: u32 = 20;

/// Default operation timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default daemon address: exec into the managed container.
#[must_use]
pub fn default_daemon_address() -> DaemonAddress {
    DaemonAddress::docker_container(DEFAULT_CONTAINER_NAME)
}

/// Owned default image reference.
#[must_use]
pub fn default_image() -> String {
    DEFAULT_IMAGE.to_owned()
}

/// Owned default container name.
#[must_use]
pub fn default_container_name() -> String {
    DEFAULT_CONTAINER_NAME.to_owned()
}

/// Owned default volume name.
#[must_use]
pub fn default_volume_name() -> String {
    DEFAULT_VOLUME_NAME.to_owned()
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Directory against which relative TLS material paths are resolved.
///
/// Falls back to a relative `buildkeep/certs` directory when the platform has
/// no configuration directory.
#[must_use]
pub fn default_tls_dir() -> Utf8PathBuf {
    let base = dirs::config_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_default();
    base.join("buildkeep").join("certs")
}
