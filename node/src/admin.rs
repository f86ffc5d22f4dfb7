//! Admin listener address classification and TLS policy.
//!
//! Unix sockets and loopback TCP addresses are served without TLS. Any
//! other address, or an explicit `https://` scheme, gets TLS unless the
//! operator disabled it. With TLS and no admin password, clients must
//! present a certificate.

use std::net::{IpAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;

use rustls::ServerConfig;
use url::Url;

use crate::config::NodeConfig;
use crate::tls::{load_client_ca_pool, load_or_generate_server_identity, server_config};
use crate::NodeError;

pub const DEFAULT_ADMIN_PORT: u16 = 8485;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminEndpoint {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl AdminEndpoint {
    /// Address to bind: `host:port` (IPv6 hosts bracketed) or the socket path.
    pub fn listen_address(&self) -> String {
        match self {
            AdminEndpoint::Tcp { host, port } if host.contains(':') => format!("[{host}]:{port}"),
            AdminEndpoint::Tcp { host, port } => format!("{host}:{port}"),
            AdminEndpoint::Unix(path) => path.display().to_string(),
        }
    }
}

/// A configured address after classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedAddress {
    pub endpoint: AdminEndpoint,
    /// The address named an `https` scheme.
    pub tls_requested: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum SplitError {
    MissingPort,
    TooManyColons,
    Malformed,
}

/// Split `host:port`, accepting `[v6]:port`.
fn split_host_port(addr: &str) -> Result<(&str, &str), SplitError> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or(SplitError::Malformed)?;
        return match after.strip_prefix(':') {
            Some(port) => Ok((host, port)),
            None if after.is_empty() => Err(SplitError::MissingPort),
            None => Err(SplitError::Malformed),
        };
    }
    match addr.matches(':').count() {
        0 => Err(SplitError::MissingPort),
        1 => addr.split_once(':').ok_or(SplitError::Malformed),
        _ => Err(SplitError::TooManyColons),
    }
}

fn parse_port(port: &str, addr: &str) -> Result<u16, NodeError> {
    if port.is_empty() {
        return Ok(DEFAULT_ADMIN_PORT);
    }
    port.parse()
        .map_err(|_| NodeError::Config(format!("invalid port in admin address {addr:?}")))
}

/// Classify the configured admin listen address.
///
/// A bare host gets [`DEFAULT_ADMIN_PORT`]; an address with a scheme or
/// several colons is parsed as a URL. A host starting with `/` is a unix socket path, on
/// which TLS is refused.
pub fn classify_address(addr: &str) -> Result<ClassifiedAddress, NodeError> {
    let addr = addr.trim();
    let unknown = || NodeError::Config(format!("unknown admin service address {addr:?}"));

    let split = if addr.contains("://") {
        Err(SplitError::TooManyColons)
    } else {
        split_host_port(addr)
    };
    let (host, port, tls_requested) = match split {
        Ok((host, port)) => (host.to_string(), port.to_string(), false),
        Err(SplitError::MissingPort) => {
            let host = addr
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(addr);
            (host.to_string(), String::new(), false)
        }
        Err(SplitError::TooManyColons) => {
            let url = Url::parse(addr).map_err(|_| unknown())?;
            if url.scheme() == "unix" && url.host_str().map_or(true, str::is_empty) {
                return Ok(ClassifiedAddress {
                    endpoint: AdminEndpoint::Unix(PathBuf::from(url.path())),
                    tls_requested: false,
                });
            }
            let host = url
                .host_str()
                .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
                .unwrap_or_default();
            // `Url::port` hides a port equal to the scheme default.
            let port = url
                .port()
                .or_else(|| {
                    url.port_or_known_default()
                        .filter(|p| addr.contains(&format!(":{p}")))
                })
                .map(|p| p.to_string())
                .unwrap_or_default();
            (host, port, url.scheme() == "https")
        }
        Err(SplitError::Malformed) => return Err(unknown()),
    };

    if host.starts_with('/') {
        if tls_requested {
            return Err(NodeError::Config(
                "unix socket with TLS is not supported".into(),
            ));
        }
        return Ok(ClassifiedAddress {
            endpoint: AdminEndpoint::Unix(PathBuf::from(host)),
            tls_requested,
        });
    }

    Ok(ClassifiedAddress {
        endpoint: AdminEndpoint::Tcp {
            port: parse_port(&port, addr)?,
            host,
        },
        tls_requested,
    })
}

/// Whether `host` is a loopback address. Names are resolved; an
/// unresolvable host is treated as not loopback.
pub fn is_loopback_host(host: &str) -> bool {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback();
    }
    match (host, 0u16).to_socket_addrs() {
        Ok(mut addrs) => addrs.next().is_some_and(|a| a.ip().is_loopback()),
        Err(error) => {
            tracing::warn!(
                host,
                %error,
                "unresolvable host, assuming not loopback, but will likely fail to listen"
            );
            false
        }
    }
}

/// How the admin endpoint authenticates clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminTlsMode {
    Disabled,
    /// TLS for encryption; clients authenticate with the admin password.
    ServerOnly,
    /// Clients must present a certificate from the client CA pool.
    Mutual,
}

/// Operator settings that decide the admin TLS policy.
#[derive(Clone, Debug)]
pub struct AdminTlsPolicy {
    pub root_dir: PathBuf,
    pub notls: bool,
    pub password: Option<String>,
    pub autogen: bool,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub hostnames: Vec<String>,
}

impl AdminTlsPolicy {
    pub fn from_config(config: &NodeConfig) -> Self {
        let password = config.app.admin_pass.trim();
        Self {
            root_dir: config.root_dir.clone(),
            notls: config.app.admin_notls,
            password: (!password.is_empty()).then(|| password.to_string()),
            autogen: config.app.autogen,
            cert_file: config.root_path(&config.app.tls_cert_file),
            key_file: config.root_path(&config.app.tls_key_file),
            hostnames: config.certificate_hostnames(),
        }
    }
}

/// The admin listener handed to the RPC server.
pub struct AdminListener {
    pub endpoint: AdminEndpoint,
    pub mode: AdminTlsMode,
    pub tls: Option<Arc<ServerConfig>>,
    pub password: Option<String>,
}

impl std::fmt::Debug for AdminListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminListener")
            .field("endpoint", &self.endpoint)
            .field("mode", &self.mode)
            .field("with_password", &self.password.is_some())
            .finish()
    }
}

/// TLS mode for a classified address, before any certificate work.
pub fn tls_mode(address: &ClassifiedAddress, policy: &AdminTlsPolicy) -> AdminTlsMode {
    let host = match &address.endpoint {
        AdminEndpoint::Unix(_) => return AdminTlsMode::Disabled,
        AdminEndpoint::Tcp { host, .. } => host,
    };
    if !address.tls_requested && is_loopback_host(host) {
        return AdminTlsMode::Disabled;
    }
    if policy.notls {
        tracing::warn!(
            addr = %address.endpoint.listen_address(),
            with_password = policy.password.is_some(),
            "disabling TLS on non-loopback admin service listen address"
        );
        return AdminTlsMode::Disabled;
    }
    if policy.password.is_some() {
        AdminTlsMode::ServerOnly
    } else {
        AdminTlsMode::Mutual
    }
}

/// Classify `addr`, decide the TLS mode and load or create the certificate
/// material it needs.
pub fn build_admin_listener(addr: &str, policy: &AdminTlsPolicy) -> Result<AdminListener, NodeError> {
    let address = classify_address(addr)?;
    let mode = tls_mode(&address, policy);

    let tls = match mode {
        AdminTlsMode::Disabled => None,
        AdminTlsMode::ServerOnly | AdminTlsMode::Mutual => {
            let identity = load_or_generate_server_identity(
                &policy.cert_file,
                &policy.key_file,
                &policy.hostnames,
            )?;
            let client_cas = match mode {
                AdminTlsMode::Mutual => Some(load_client_ca_pool(&policy.root_dir, policy.autogen)?),
                _ => None,
            };
            Some(server_config(identity, client_cas)?)
        }
    };

    tracing::info!(
        addr = %address.endpoint.listen_address(),
        tls = ?mode,
        "admin service listener configured"
    );
    Ok(AdminListener {
        endpoint: address.endpoint,
        mode,
        tls,
        password: policy.password.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp(host: &str, port: u16) -> AdminEndpoint {
        AdminEndpoint::Tcp {
            host: host.to_string(),
            port,
        }
    }

    fn policy(root: &std::path::Path) -> AdminTlsPolicy {
        AdminTlsPolicy {
            root_dir: root.to_path_buf(),
            notls: false,
            password: None,
            autogen: false,
            cert_file: root.join("admin.cert"),
            key_file: root.join("admin.key"),
            hostnames: vec!["node.test".into()],
        }
    }

    #[test]
    fn host_port_is_split() {
        let c = classify_address("127.0.0.1:8485").unwrap();
        assert_eq!(c.endpoint, tcp("127.0.0.1", 8485));
        assert!(!c.tls_requested);
    }

    #[test]
    fn missing_port_defaults() {
        assert_eq!(classify_address("localhost").unwrap().endpoint, tcp("localhost", 8485));
    }

    #[test]
    fn url_form_with_https_requests_tls() {
        let c = classify_address("https://0.0.0.0:9000").unwrap();
        assert_eq!(c.endpoint, tcp("0.0.0.0", 9000));
        assert!(c.tls_requested);

        let c = classify_address("http://10.1.2.3").unwrap();
        assert_eq!(c.endpoint, tcp("10.1.2.3", 8485));
        assert!(!c.tls_requested);

        let c = classify_address("https://10.1.2.3:443").unwrap();
        assert_eq!(c.endpoint, tcp("10.1.2.3", 443));
    }

    #[test]
    fn bracketed_ipv6_is_accepted() {
        let c = classify_address("[::1]:8485").unwrap();
        assert_eq!(c.endpoint, tcp("::1", 8485));
        assert_eq!(c.endpoint.listen_address(), "[::1]:8485");
    }

    #[test]
    fn bracketed_ipv6_without_port_defaults() {
        let c = classify_address("[::1]").unwrap();
        assert_eq!(c.endpoint, tcp("::1", DEFAULT_ADMIN_PORT));
        assert_eq!(c.endpoint.listen_address(), "[::1]:8485");

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(tls_mode(&c, &policy(dir.path())), AdminTlsMode::Disabled);
    }

    #[test]
    fn unix_socket_paths() {
        let c = classify_address("/tmp/bastion/admin.sock").unwrap();
        assert_eq!(c.endpoint, AdminEndpoint::Unix("/tmp/bastion/admin.sock".into()));
        assert_eq!(
            classify_address("unix:///run/admin.sock").unwrap().endpoint,
            AdminEndpoint::Unix("/run/admin.sock".into())
        );
        // The port part of a socket path is ignored.
        assert_eq!(
            classify_address("/tmp/admin.sock:1").unwrap().endpoint,
            AdminEndpoint::Unix("/tmp/admin.sock".into())
        );
    }

    #[test]
    fn malformed_addresses_are_config_errors() {
        assert!(matches!(classify_address("::1"), Err(NodeError::Config(_))));
        assert!(matches!(classify_address("host:port"), Err(NodeError::Config(_))));
        assert!(matches!(classify_address("[::1"), Err(NodeError::Config(_))));
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback_host("127.0.0.1"));
        assert!(is_loopback_host("::1"));
        assert!(!is_loopback_host("0.0.0.0"));
        assert!(!is_loopback_host("10.0.0.1"));
    }

    #[test]
    fn loopback_without_tls_request_is_plain() {
        let dir = tempfile::tempdir().unwrap();
        let listener = build_admin_listener("127.0.0.1:8485", &policy(dir.path())).unwrap();
        assert_eq!(listener.mode, AdminTlsMode::Disabled);
        assert!(listener.tls.is_none());
        assert!(!dir.path().join("admin.cert").exists());
    }

    #[test]
    fn wildcard_address_gets_mutual_tls() {
        let dir = tempfile::tempdir().unwrap();
        let listener = build_admin_listener("0.0.0.0:8485", &policy(dir.path())).unwrap();
        assert_eq!(listener.mode, AdminTlsMode::Mutual);
        assert!(listener.tls.is_some());
        assert!(dir.path().join("admin.cert").exists());
    }

    #[test]
    fn password_means_server_only_tls() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = policy(dir.path());
        p.password = Some("secret".into());
        let listener = build_admin_listener("0.0.0.0:8485", &p).unwrap();
        assert_eq!(listener.mode, AdminTlsMode::ServerOnly);
    }

    #[test]
    fn notls_disables_tls_on_public_address() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = policy(dir.path());
        p.notls = true;
        let listener = build_admin_listener("0.0.0.0:8485", &p).unwrap();
        assert_eq!(listener.mode, AdminTlsMode::Disabled);
        assert!(listener.tls.is_none());
    }

    #[test]
    fn explicit_https_on_loopback_enables_tls() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = policy(dir.path());
        p.password = Some("secret".into());
        let listener = build_admin_listener("https://127.0.0.1:8485", &p).unwrap();
        assert_eq!(listener.mode, AdminTlsMode::ServerOnly);
    }

    #[test]
    fn unix_socket_never_uses_tls() {
        let dir = tempfile::tempdir().unwrap();
        let listener = build_admin_listener("/tmp/admin.sock", &policy(dir.path())).unwrap();
        assert_eq!(listener.mode, AdminTlsMode::Disabled);
        assert!(matches!(listener.endpoint, AdminEndpoint::Unix(_)));
    }
}
