//! Daemon address parsing and locality inference.

use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DOCKER_CONTAINER_SCHEME: &str = "docker-container";
const PODMAN_CONTAINER_SCHEME: &str = "podman-container";

/// Network address of the build daemon.
///
/// Addresses round-trip through their URL form so they can be supplied as a
/// single string in configuration files, environment variables, or flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DaemonAddress {
    /// Daemon reached through `docker exec` into a managed container.
    DockerContainer {
        /// Container name.
        name: String,
    },
    /// Daemon reached through `podman exec` into a managed container.
    PodmanContainer {
        /// Container name.
        name: String,
    },
    /// Daemon listening on a TCP port.
    Tcp {
        /// Host name or IP literal.
        host: String,
        /// TCP port.
        port: u16,
    },
    /// Daemon listening on a Unix domain socket.
    Unix {
        /// Socket path.
        path: Utf8PathBuf,
    },
}

impl DaemonAddress {
    /// Builds a TCP address.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Builds a Docker container address.
    #[must_use]
    pub fn docker_container(name: impl Into<String>) -> Self {
        Self::DockerContainer { name: name.into() }
    }

    /// Builds a Unix domain socket address.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Reports whether the address designates a daemon managed on this host.
    ///
    /// Container schemes are always local. TCP addresses are local when they
    /// point at the loopback interface by name or IPv4 literal. Unix sockets
    /// are treated as externally provided endpoints.
    #[must_use]
    pub fn is_local(&self) -> bool {
        match self {
            Self::DockerContainer { .. } | Self::PodmanContainer { .. } => true,
            Self::Tcp { host, .. } => host == "127.0.0.1" || host == "localhost",
            Self::Unix { .. } => false,
        }
    }

    /// Returns the host name when the address uses TCP transport.
    #[must_use]
    pub fn tcp_host(&self) -> Option<&str> {
        match self {
            Self::Tcp { host, .. } => Some(host.as_str()),
            _ => None,
        }
    }

    /// Returns the port when the address uses TCP transport.
    #[must_use]
    pub fn tcp_port(&self) -> Option<u16> {
        match self {
            Self::Tcp { port, .. } => Some(*port),
            _ => None,
        }
    }

    /// Returns the socket path when the address uses a Unix socket.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_ref()),
            _ => None,
        }
    }

    /// Reports whether the address uses TCP transport.
    #[must_use]
    pub fn uses_tcp(&self) -> bool {
        matches!(self, Self::Tcp { .. })
    }
}

impl fmt::Display for DaemonAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DockerContainer { name } => write!(formatter, "{DOCKER_CONTAINER_SCHEME}://{name}"),
            Self::PodmanContainer { name } => write!(formatter, "{PODMAN_CONTAINER_SCHEME}://{name}"),
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
            Self::Unix { path } => write!(formatter, "unix://{path}"),
        }
    }
}

impl FromStr for DaemonAddress {
    type Err = AddressParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        match url.scheme() {
            scheme @ (DOCKER_CONTAINER_SCHEME | PODMAN_CONTAINER_SCHEME) => {
                let name = url
                    .host_str()
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| AddressParseError::MissingContainer(input.to_owned()))?;
                if scheme == DOCKER_CONTAINER_SCHEME {
                    Ok(Self::DockerContainer {
                        name: name.to_owned(),
                    })
                } else {
                    Ok(Self::PodmanContainer {
                        name: name.to_owned(),
                    })
                }
            }
            "tcp" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| AddressParseError::MissingHost(input.to_owned()))?;
                let port = url
                    .port()
                    .ok_or_else(|| AddressParseError::MissingPort(input.to_owned()))?;
                Ok(Self::tcp(host, port))
            }
            "unix" => {
                let path = url.path();
                if path.is_empty() {
                    return Err(AddressParseError::MissingUnixPath(input.to_owned()));
                }
                Ok(Self::unix(path))
            }
            other => Err(AddressParseError::UnsupportedScheme(other.to_owned())),
        }
    }
}

impl TryFrom<String> for DaemonAddress {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DaemonAddress> for String {
    fn from(address: DaemonAddress) -> Self {
        address.to_string()
    }
}

/// Errors encountered while parsing a [`DaemonAddress`] from text.
#[derive(Debug, Error)]
pub enum AddressParseError {
    /// Scheme was not recognised.
    #[error("unsupported daemon address scheme '{0}'")]
    UnsupportedScheme(String),
    /// TCP host name was missing.
    #[error("missing TCP host in '{0}'")]
    MissingHost(String),
    /// TCP port was missing from the address.
    #[error("missing TCP port in '{0}'")]
    MissingPort(String),
    /// Unix socket path was absent.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// Container name was absent from a container address.
    #[error("missing container name in '{0}'")]
    MissingContainer(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}
