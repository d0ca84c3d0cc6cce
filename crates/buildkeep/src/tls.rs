//! Resolution of TLS material referenced by [`Settings`].

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::client::TlsCredentials;
use crate::settings::Settings;

/// Server material mounted into a locally managed daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTls {
    /// Certificate authority bundle.
    pub ca: Utf8PathBuf,
    /// Server certificate.
    pub cert: Utf8PathBuf,
    /// Server key.
    pub key: Utf8PathBuf,
}

/// Errors raised while resolving TLS material.
#[derive(Debug, Error)]
pub enum TlsError {
    /// The file does not exist.
    #[error("{role} '{path}' does not exist")]
    Missing {
        /// Which piece of material was missing.
        role: &'static str,
        /// Resolved path.
        path: Utf8PathBuf,
    },
    /// The file could not be inspected.
    #[error("failed to inspect {role} '{path}': {source}")]
    Inspect {
        /// Which piece of material was inspected.
        role: &'static str,
        /// Resolved path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Client credentials for the daemon connection.
///
/// Returns `None` unless TLS is enabled on a TCP address.
///
/// # Errors
///
/// Returns [`TlsError`] when any client file is missing.
pub fn client_credentials(settings: &Settings) -> Result<Option<TlsCredentials>, TlsError> {
    if !settings.tls_active() {
        return Ok(None);
    }
    let server_name = settings.address.tcp_host().unwrap_or_default().to_owned();
    Ok(Some(TlsCredentials {
        server_name,
        ca: existing(settings, "CA certificate", &settings.tls.ca)?,
        cert: existing(settings, "client certificate", &settings.tls.client_cert)?,
        key: existing(settings, "client key", &settings.tls.client_key)?,
    }))
}

/// Server material for a locally managed daemon.
///
/// Returns `None` unless TLS is enabled on a TCP address.
///
/// # Errors
///
/// Returns [`TlsError`] when any server file is missing.
pub fn server_material(settings: &Settings) -> Result<Option<ServerTls>, TlsError> {
    if !settings.tls_active() {
        return Ok(None);
    }
    Ok(Some(ServerTls {
        ca: existing(settings, "CA certificate", &settings.tls.ca)?,
        cert: existing(settings, "server certificate", &settings.tls.server_cert)?,
        key: existing(settings, "server key", &settings.tls.server_key)?,
    }))
}

fn existing(
    settings: &Settings,
    role: &'static str,
    path: &Utf8Path,
) -> Result<Utf8PathBuf, TlsError> {
    let resolved = settings.tls.resolve(path);
    match fs::metadata(&resolved) {
        Ok(_) => Ok(resolved),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Err(TlsError::Missing {
            role,
            path: resolved,
        }),
        Err(source) => Err(TlsError::Inspect {
            role,
            path: resolved,
            source,
        }),
    }
}
