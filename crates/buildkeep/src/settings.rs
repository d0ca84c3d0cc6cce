//! Validated daemon settings and their behavioural fingerprint.
//!
//! [`Settings`] is built once from the layered [`Config`] and then treated as
//! an immutable value. The [`Fingerprint`] digests only the fields that change
//! how the daemon behaves, so a running container can be compared with the
//! desired configuration through a single label.

use std::fmt;
use std::time::Duration;

use buildkeep_config::{Config, DaemonAddress};
use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use thiserror::Error;

const DEFAULT_TLS_CA: &str = "ca_cert.pem";
const DEFAULT_TLS_SERVER_CERT: &str = "server_cert.pem";
const DEFAULT_TLS_SERVER_KEY: &str = "server_key.pem";
const DEFAULT_TLS_CLIENT_CERT: &str = "client_cert.pem";
const DEFAULT_TLS_CLIENT_KEY: &str = "client_key.pem";

/// Where the daemon lives relative to this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    /// The controller owns the daemon container on this host.
    Local,
    /// The daemon is provided externally; only connections are attempted.
    Remote,
}

/// TLS material locations. Relative paths resolve against `dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    /// Enables TLS on TCP transports.
    pub enabled: bool,
    /// Base directory for relative paths.
    pub dir: Utf8PathBuf,
    /// Certificate authority bundle.
    pub ca: Utf8PathBuf,
    /// Server certificate mounted into the managed daemon.
    pub server_cert: Utf8PathBuf,
    /// Server key mounted into the managed daemon.
    pub server_key: Utf8PathBuf,
    /// Client certificate presented when connecting.
    pub client_cert: Utf8PathBuf,
    /// Client key presented when connecting.
    pub client_key: Utf8PathBuf,
}

impl TlsSettings {
    fn from_config(config: &Config) -> Self {
        let pick = |value: &Option<Utf8PathBuf>, fallback: &str| {
            value.clone().unwrap_or_else(|| Utf8PathBuf::from(fallback))
        };
        Self {
            enabled: config.tls_enabled,
            dir: config.tls_dir(),
            ca: pick(&config.tls_ca, DEFAULT_TLS_CA),
            server_cert: pick(&config.tls_server_cert, DEFAULT_TLS_SERVER_CERT),
            server_key: pick(&config.tls_server_key, DEFAULT_TLS_SERVER_KEY),
            client_cert: pick(&config.tls_client_cert, DEFAULT_TLS_CLIENT_CERT),
            client_key: pick(&config.tls_client_key, DEFAULT_TLS_CLIENT_KEY),
        }
    }

    /// Resolves `path` against the TLS directory unless it is absolute.
    #[must_use]
    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }
}

/// Desired daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Address the daemon is reached on.
    pub address: DaemonAddress,
    /// Whether the daemon is managed on this host.
    pub locality: Locality,
    /// TLS material.
    pub tls: TlsSettings,
    /// Maximum number of concurrent daemon operations.
    pub max_parallelism: u32,
    /// Absolute cache size target in megabytes; zero leaves it unset.
    pub cache_size_mb: u32,
    /// Cache size target as a percentage of the disk; zero leaves it unset.
    pub cache_size_pct: u32,
    /// Enables daemon debug logging.
    pub debug: bool,
    /// Exposes the daemon profiler endpoint.
    pub enable_profiler: bool,
    /// Extra container run arguments.
    pub additional_args: Vec<String>,
    /// Extra daemon configuration.
    pub additional_config: Option<String>,
    /// MTU applied to the daemon's CNI network.
    pub cni_mtu: Option<u16>,
    /// Volume holding the daemon cache.
    pub volume_name: String,
    /// Budget for start, stop, and readiness operations.
    pub timeout: Duration,
    /// Keeps a running daemon even when a newer image is available.
    pub no_update: bool,
    /// Lock file serialising concurrent start attempts on this host.
    pub startup_lock_path: Option<Utf8PathBuf>,
}

/// Errors raised while validating configuration into [`Settings`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// Cache percentage above 100.
    #[error("cache size percentage {percent} exceeds 100")]
    CachePercentOutOfRange {
        /// Rejected percentage.
        percent: u32,
    },
    /// A zero operation timeout would fail every wait immediately.
    #[error("operation timeout must be greater than zero")]
    ZeroTimeout,
    /// A zero parallelism limit would stall every build.
    #[error("maximum parallelism must be greater than zero")]
    ZeroParallelism,
}

impl Settings {
    /// Validates `config` into settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when a value is out of range.
    pub fn from_config(config: &Config) -> Result<Self, SettingsError> {
        if config.cache_size_pct > 100 {
            return Err(SettingsError::CachePercentOutOfRange {
                percent: config.cache_size_pct,
            });
        }
        if config.timeout_secs == 0 {
            return Err(SettingsError::ZeroTimeout);
        }
        if config.max_parallelism == 0 {
            return Err(SettingsError::ZeroParallelism);
        }
        let locality = if config.is_local() {
            Locality::Local
        } else {
            Locality::Remote
        };
        Ok(Self {
            address: config.daemon_address().clone(),
            locality,
            tls: TlsSettings::from_config(config),
            max_parallelism: config.max_parallelism,
            cache_size_mb: config.cache_size_mb,
            cache_size_pct: config.cache_size_pct,
            debug: config.debug,
            enable_profiler: config.enable_profiler,
            additional_args: config.additional_args(),
            additional_config: config
                .additional_config
                .clone()
                .filter(|value| !value.is_empty()),
            cni_mtu: config.cni_mtu.filter(|mtu| *mtu > 0),
            volume_name: config.volume_name.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            no_update: config.no_update,
            startup_lock_path: config.startup_lock_path.clone(),
        })
    }

    /// Reports whether the daemon container is managed on this host.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.locality == Locality::Local
    }

    /// Reports whether TLS applies to the daemon transport.
    #[must_use]
    pub fn tls_active(&self) -> bool {
        self.tls.enabled && self.address.uses_tcp()
    }

    /// Digest of the behaviour-affecting subset of these settings.
    ///
    /// Timeout, update inhibition, lock path, and locality are excluded: they
    /// change how the controller waits, never how the daemon runs. The address
    /// contributes only its transport and published port, so spellings that
    /// yield the same container (`localhost` and `127.0.0.1`, or another
    /// container name) share a digest. TLS paths only contribute when TLS is
    /// active, and client material never does.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = FieldHasher::default();
        hasher
            .field("tcp", bool_bytes(self.address.uses_tcp()))
            .field("tcp_port", decimal(self.address.tcp_port()).as_bytes())
            .field("tls", bool_bytes(self.tls_active()));
        if self.tls_active() {
            hasher
                .field("tls_ca", self.tls.resolve(&self.tls.ca).as_str().as_bytes())
                .field(
                    "tls_server_cert",
                    self.tls.resolve(&self.tls.server_cert).as_str().as_bytes(),
                )
                .field(
                    "tls_server_key",
                    self.tls.resolve(&self.tls.server_key).as_str().as_bytes(),
                );
        }
        hasher
            .field("max_parallelism", decimal(Some(self.max_parallelism)).as_bytes())
            .field("cache_size_mb", decimal(Some(self.cache_size_mb)).as_bytes())
            .field("cache_size_pct", decimal(Some(self.cache_size_pct)).as_bytes())
            .field("debug", bool_bytes(self.debug))
            .field("enable_profiler", bool_bytes(self.enable_profiler))
            .field(
                "additional_config",
                self.additional_config.as_deref().unwrap_or_default().as_bytes(),
            )
            .field("cni_mtu", decimal(self.cni_mtu).as_bytes())
            .field("volume_name", self.volume_name.as_bytes());
        for argument in &self.additional_args {
            hasher.field("additional_arg", argument.as_bytes());
        }
        hasher.finish()
    }

    /// Reports whether `fingerprint` was produced from equivalent settings.
    #[must_use]
    pub fn verify(&self, fingerprint: &str) -> bool {
        self.fingerprint().as_str() == fingerprint
    }
}

const fn bool_bytes(value: bool) -> &'static [u8] {
    if value { b"1" } else { b"0" }
}

// Numbers are hashed as decimal text; an absent value hashes as empty.
fn decimal<T: fmt::Display>(value: Option<T>) -> String {
    value.map(|number| number.to_string()).unwrap_or_default()
}

/// Netstring field feed (`<len>:<bytes>,`) so adjacent values can never alias.
#[derive(Default)]
struct FieldHasher(Sha256);

impl FieldHasher {
    fn field(&mut self, name: &str, value: &[u8]) -> &mut Self {
        for part in [name.as_bytes(), value] {
            self.0.update(format!("{}:", part.len()));
            self.0.update(part);
            self.0.update(b",");
        }
        self
    }

    fn finish(self) -> Fingerprint {
        Fingerprint(format!("{:x}", self.0.finalize()))
    }
}

/// Lower-case hex SHA-256 digest of behaviour-affecting settings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hex digest.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.0
    }
}
