//! Translation of [`Settings`] into a [`ContainerRun`].

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

use crate::frontend::{ContainerRun, Mount, MountKind, PortMapping};
use crate::settings::{Fingerprint, Settings};
use crate::tls::ServerTls;

/// Container label holding the settings fingerprint.
pub const FINGERPRINT_LABEL: &str = "dev.buildkeep.settings-fingerprint";

/// Cache volume mount point inside the container.
pub const CACHE_MOUNT_TARGET: &str = "/var/lib/buildd";

/// Daemon TCP port inside the container.
pub const DAEMON_PORT: u16 = 8372;

/// Host port publishing the profiler; 6060 is left for the client.
pub const PROFILER_HOST_PORT: u16 = 6061;

/// Profiler port inside the container.
pub const PROFILER_CONTAINER_PORT: u16 = 6060;

const TLS_CA_TARGET: &str = "/etc/buildd/ca.pem";
const TLS_CERT_TARGET: &str = "/etc/buildd/cert.pem";
const TLS_KEY_TARGET: &str = "/etc/buildd/key.pem";

/// Builds the run request for the managed daemon container.
///
/// `reset` asks the daemon to wipe its persisted state on start.
#[must_use]
pub(crate) fn container_run(
    name: &str,
    image: &str,
    settings: &Settings,
    fingerprint: &Fingerprint,
    server_tls: Option<&ServerTls>,
    reset: bool,
) -> ContainerRun {
    ContainerRun {
        name: name.to_owned(),
        image: image.to_owned(),
        privileged: true,
        env: environment(settings, reset),
        labels: BTreeMap::from([(FINGERPRINT_LABEL.to_owned(), fingerprint.to_string())]),
        mounts: mounts(settings, server_tls),
        ports: ports(settings),
        additional_args: settings.additional_args.clone(),
    }
}

fn environment(settings: &Settings, reset: bool) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    let mut set = |key: &str, value: String| {
        env.insert(key.to_owned(), value);
    };
    set("BUILDD_DEBUG", settings.debug.to_string());
    set(
        "BUILDD_TCP_TRANSPORT_ENABLED",
        settings.address.uses_tcp().to_string(),
    );
    set("BUILDD_TLS_ENABLED", settings.tls_active().to_string());
    set("BUILDD_MAX_PARALLELISM", settings.max_parallelism.to_string());
    if let Some(config) = &settings.additional_config {
        set("BUILDD_ADDITIONAL_CONFIG", config.clone());
    }
    if let Some(mtu) = settings.cni_mtu {
        set("BUILDD_CNI_MTU", mtu.to_string());
    }
    if settings.cache_size_mb > 0 {
        set("BUILDD_CACHE_SIZE_MB", settings.cache_size_mb.to_string());
    }
    if settings.cache_size_pct > 0 {
        set("BUILDD_CACHE_SIZE_PCT", settings.cache_size_pct.to_string());
    }
    if settings.enable_profiler {
        set("BUILDD_PPROF_ENABLED", true.to_string());
    }
    if reset {
        set("BUILDD_RESET_STATE", true.to_string());
    }
    env
}

fn mounts(settings: &Settings, server_tls: Option<&ServerTls>) -> Vec<Mount> {
    let mut mounts = vec![Mount {
        kind: MountKind::Volume,
        source: settings.volume_name.clone(),
        target: CACHE_MOUNT_TARGET.to_owned(),
        read_only: false,
    }];
    if let Some(tls) = server_tls {
        for (source, target) in [
            (&tls.ca, TLS_CA_TARGET),
            (&tls.cert, TLS_CERT_TARGET),
            (&tls.key, TLS_KEY_TARGET),
        ] {
            mounts.push(Mount {
                kind: MountKind::Bind,
                source: source.to_string(),
                target: target.to_owned(),
                read_only: true,
            });
        }
    }
    mounts
}

fn ports(settings: &Settings) -> Vec<PortMapping> {
    let Some(host_port) = settings.address.tcp_port() else {
        return Vec::new();
    };
    let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let mut ports = vec![PortMapping {
        ip: loopback,
        host_port,
        container_port: DAEMON_PORT,
    }];
    if settings.enable_profiler {
        ports.push(PortMapping {
            ip: loopback,
            host_port: PROFILER_HOST_PORT,
            container_port: PROFILER_CONTAINER_PORT,
        });
    }
    ports
}
