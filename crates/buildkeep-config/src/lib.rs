//! Layered configuration for the build daemon lifecycle controller.
//!
//! Values are merged from built-in defaults, configuration files, the
//! `BUILDKEEP_*` environment, and command-line flags, in increasing order of
//! precedence, via [`ortho_config`]. The resulting [`Config`] is a plain
//! value; the controller validates it into its own settings type before any
//! lifecycle decision is made.

mod address;
mod choices;
mod defaults;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

pub use address::{AddressParseError, DaemonAddress};
pub use choices::{ChoiceParseError, LocalityPreference, LogFormat};
pub use defaults::{
    DEFAULT_CONTAINER_NAME, DEFAULT_IMAGE, DEFAULT_LOG_FILTER, DEFAULT_MAX_PARALLELISM,
    DEFAULT_TIMEOUT_SECS, DEFAULT_VOLUME_NAME, default_container_name, default_daemon_address,
    default_image, default_log_filter, default_log_format, default_tls_dir, default_volume_name,
};
pub use ortho_config::{OrthoConfig, OrthoError};

/// Desired daemon configuration as loaded from all configuration layers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "BUILDKEEP")]
pub struct Config {
    /// Address the daemon is reached on.
    #[ortho_config(default = defaults::default_daemon_address())]
    pub daemon_address: DaemonAddress,
    /// Locality override; `auto` infers it from the address.
    #[ortho_config(default = LocalityPreference::Auto)]
    pub locality: LocalityPreference,
    /// Image reference used for the managed daemon container.
    #[ortho_config(default = defaults::default_image())]
    pub image: String,
    /// Name of the managed daemon container.
    #[ortho_config(default = defaults::default_container_name())]
    pub container_name: String,
    /// Volume mounted as the daemon's persisted cache.
    #[ortho_config(default = defaults::default_volume_name())]
    pub volume_name: String,
    /// Enables TLS on TCP transports.
    #[ortho_config(default = false)]
    pub tls_enabled: bool,
    /// Base directory for relative TLS material paths.
    pub tls_dir: Option<Utf8PathBuf>,
    /// Certificate authority bundle.
    pub tls_ca: Option<Utf8PathBuf>,
    /// Server certificate mounted into the managed daemon.
    pub tls_server_cert: Option<Utf8PathBuf>,
    /// Server key mounted into the managed daemon.
    pub tls_server_key: Option<Utf8PathBuf>,
    /// Client certificate presented to the daemon.
    pub tls_client_cert: Option<Utf8PathBuf>,
    /// Client key presented to the daemon.
    pub tls_client_key: Option<Utf8PathBuf>,
    /// Maximum number of concurrent daemon operations.
    #[ortho_config(default = defaults::DEFAULT_MAX_PARALLELISM)]
    pub max_parallelism: u32,
    /// Absolute cache size target in megabytes; zero leaves it to the daemon.
    #[ortho_config(default = 0)]
    pub cache_size_mb: u32,
    /// Cache size target as a percentage of the disk; zero leaves it unset.
    #[ortho_config(default = 0)]
    pub cache_size_pct: u32,
    /// Enables daemon debug logging.
    #[ortho_config(default = false)]
    pub debug: bool,
    /// Exposes the daemon profiler endpoint.
    #[ortho_config(default = false)]
    pub enable_profiler: bool,
    /// Extra container run arguments, separated by whitespace.
    pub additional_args: Option<String>,
    /// Extra daemon configuration appended to its config file.
    pub additional_config: Option<String>,
    /// MTU applied to the daemon's CNI network.
    pub cni_mtu: Option<u16>,
    /// Timeout, in seconds, for start, stop, and readiness operations.
    #[ortho_config(default = defaults::DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
    /// Keeps a running daemon even when a newer image is available.
    #[ortho_config(default = false)]
    pub no_update: bool,
    /// Lock file serialising concurrent start attempts on this host.
    pub startup_lock_path: Option<Utf8PathBuf>,
    /// Tracing filter expression.
    #[ortho_config(default = defaults::default_log_filter())]
    pub log_filter: String,
    /// Tracing output format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_address: default_daemon_address(),
            locality: LocalityPreference::Auto,
            image: default_image(),
            container_name: default_container_name(),
            volume_name: default_volume_name(),
            tls_enabled: false,
            tls_dir: None,
            tls_ca: None,
            tls_server_cert: None,
            tls_server_key: None,
            tls_client_cert: None,
            tls_client_key: None,
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            cache_size_mb: 0,
            cache_size_pct: 0,
            debug: false,
            enable_profiler: false,
            additional_args: None,
            additional_config: None,
            cni_mtu: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            no_update: false,
            startup_lock_path: None,
            log_filter: default_log_filter(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Address the daemon is reached on.
    #[must_use]
    pub fn daemon_address(&self) -> &DaemonAddress {
        &self.daemon_address
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Tracing output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Directory used to resolve relative TLS paths.
    #[must_use]
    pub fn tls_dir(&self) -> Utf8PathBuf {
        self.tls_dir.clone().unwrap_or_else(default_tls_dir)
    }

    /// Extra container run arguments split on whitespace.
    #[must_use]
    pub fn additional_args(&self) -> Vec<String> {
        self.additional_args
            .as_deref()
            .map(|args| args.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Reports whether the daemon should be managed on this host.
    #[must_use]
    pub fn is_local(&self) -> bool {
        match self.locality {
            LocalityPreference::Auto => self.daemon_address.is_local(),
            LocalityPreference::Local => true,
            LocalityPreference::Remote => false,
        }
    }
}
