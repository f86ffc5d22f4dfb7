//! Certificate material for the admin service.
//!
//! Files under the node root:
//! - `admin.cert` / `admin.key`: server pair, self-signed on first start
//! - `clients.pem`: CA pool that admin client certificates must chain to
//! - `auth.cert` / `auth.key`: admin client pair generated in autogen mode

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rcgen::{CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, KeyPair};
use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::WebPkiClientVerifier;
use rustls::{
    CertificateError, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme,
};

use crate::NodeError;

pub const CLIENT_CA_FILE: &str = "clients.pem";
pub const AUTOGEN_CLIENT_CERT_FILE: &str = "auth.cert";
pub const AUTOGEN_CLIENT_KEY_FILE: &str = "auth.key";
pub const AUTOGEN_CLIENT_ISSUER: &str = "local bastion CA";

/// Used as SAN when no hostname is configured.
const FALLBACK_HOSTNAMES: &[&str] = &["localhost", "127.0.0.1"];

/// Server certificate chain and key.
pub struct ServerIdentity {
    pub chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

/// Trust roots for admin client certificates.
#[derive(Debug)]
pub enum ClientCaPool {
    Provisioned(RootCertStore),
    /// No CA file exists. Client certificates are still required, and none
    /// can validate until an operator provisions `clients.pem`.
    Unprovisioned,
}

fn tls_err(context: &str) -> impl FnOnce(rustls::Error) -> NodeError + '_ {
    move |e| NodeError::Tls(format!("{context}: {e}"))
}

fn cert_err(context: String) -> impl FnOnce(rcgen::Error) -> NodeError {
    move |e| NodeError::Tls(format!("{context}: {e}"))
}

/// Generate a self-signed key pair and write it as PEM. `issuer` becomes the
/// subject common name; `subject_alt_names` may be DNS names or IPs.
pub fn generate_key_pair(
    cert_path: &Path,
    key_path: &Path,
    issuer: &str,
    subject_alt_names: &[String],
    client_auth: bool,
) -> Result<(), NodeError> {
    let context = format!("generate {}", cert_path.display());
    let mut params =
        CertificateParams::new(subject_alt_names.to_vec()).map_err(cert_err(context.clone()))?;
    let common_name = if issuer.is_empty() {
        subject_alt_names.first().map(String::as_str).unwrap_or("bastion")
    } else {
        issuer
    };
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    name.push(DnType::OrganizationName, "bastion");
    params.distinguished_name = name;
    params.extended_key_usages = vec![if client_auth {
        ExtendedKeyUsagePurpose::ClientAuth
    } else {
        ExtendedKeyUsagePurpose::ServerAuth
    }];

    let key_pair = KeyPair::generate().map_err(cert_err(context.clone()))?;
    let cert = params.self_signed(&key_pair).map_err(cert_err(context))?;

    write_private(key_path, key_pair.serialize_pem().as_bytes())?;
    fs::write(cert_path, cert.pem())?;
    Ok(())
}

/// Write a file readable only by the owner.
fn write_private(path: &Path, contents: &[u8]) -> Result<(), NodeError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    Ok(())
}

pub fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, NodeError> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| NodeError::Config(format!("invalid certificates in {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(NodeError::Config(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, NodeError> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| NodeError::Config(format!("invalid private key in {}: {e}", path.display())))?
        .ok_or_else(|| NodeError::Config(format!("no private key found in {}", path.display())))
}

/// Load the server pair, generating a self-signed one for `hostnames` when
/// neither file exists. Exactly one file present is a configuration error.
pub fn load_or_generate_server_identity(
    cert_path: &Path,
    key_path: &Path,
    hostnames: &[String],
) -> Result<ServerIdentity, NodeError> {
    match (cert_path.exists(), key_path.exists()) {
        (true, true) => {}
        (false, false) => {
            let sans = if hostnames.is_empty() {
                FALLBACK_HOSTNAMES.iter().map(|h| h.to_string()).collect()
            } else {
                hostnames.to_vec()
            };
            generate_key_pair(cert_path, key_path, "", &sans, false)?;
            tracing::info!(
                cert = %cert_path.display(),
                key = %key_path.display(),
                hostnames = ?sans,
                "generated self-signed admin TLS certificate"
            );
        }
        (cert, key) => {
            return Err(NodeError::Config(format!(
                "missing a key/cert pair file: cert {} {}, key {} {}",
                cert_path.display(),
                if cert { "present" } else { "missing" },
                key_path.display(),
                if key { "present" } else { "missing" },
            )));
        }
    }
    Ok(ServerIdentity {
        chain: load_certificates(cert_path)?,
        key: load_private_key(key_path)?,
    })
}

/// Build the client CA pool from `clients.pem` under `root_dir`. Without
/// that file, autogen mode creates an admin client pair and seeds the pool
/// with its certificate.
pub fn load_client_ca_pool(root_dir: &Path, autogen: bool) -> Result<ClientCaPool, NodeError> {
    let clients_file = root_dir.join(CLIENT_CA_FILE);
    if !clients_file.exists() {
        if !autogen {
            tracing::info!(
                file = %clients_file.display(),
                "no admin client CAs file; client certificates cannot validate until one is provisioned"
            );
            return Ok(ClientCaPool::Unprovisioned);
        }
        let (cert_file, key_file) = autogen_client_paths(root_dir);
        generate_key_pair(&cert_file, &key_file, AUTOGEN_CLIENT_ISSUER, &[], true)?;
        tracing::info!(
            cert = %cert_file.display(),
            key = %key_file.display(),
            "generated admin service client key pair"
        );
        fs::copy(&cert_file, &clients_file)?;
        tracing::info!(file = %clients_file.display(), "generated admin service client CAs file");
    }

    let mut roots = RootCertStore::empty();
    for cert in load_certificates(&clients_file)? {
        roots
            .add(cert)
            .map_err(|e| NodeError::Config(format!("invalid client CAs file: {e}")))?;
    }
    Ok(ClientCaPool::Provisioned(roots))
}

pub fn autogen_client_paths(root_dir: &Path) -> (PathBuf, PathBuf) {
    (
        root_dir.join(AUTOGEN_CLIENT_CERT_FILE),
        root_dir.join(AUTOGEN_CLIENT_KEY_FILE),
    )
}

/// Client verifier that requires a certificate and accepts none.
#[derive(Debug)]
struct RejectAllClients {
    schemes: Vec<SignatureScheme>,
}

impl ClientCertVerifier for RejectAllClients {
    fn root_hint_subjects(&self) -> &[rustls::DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Err(rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer))
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Err(rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer))
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Err(rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer))
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes.clone()
    }
}

fn client_verifier(
    pool: ClientCaPool,
    provider: &Arc<CryptoProvider>,
) -> Result<Arc<dyn ClientCertVerifier>, NodeError> {
    match pool {
        ClientCaPool::Provisioned(roots) => {
            WebPkiClientVerifier::builder_with_provider(Arc::new(roots), Arc::clone(provider))
                .build()
                .map_err(|e| NodeError::Tls(format!("client certificate verifier: {e}")))
        }
        ClientCaPool::Unprovisioned => Ok(Arc::new(RejectAllClients {
            schemes: provider
                .signature_verification_algorithms
                .supported_schemes(),
        })),
    }
}

/// Server TLS config. With a client CA pool, clients must present a
/// certificate (mutual TLS); without one, TLS only encrypts and
/// authenticates the server.
pub fn server_config(
    identity: ServerIdentity,
    client_cas: Option<ClientCaPool>,
) -> Result<Arc<ServerConfig>, NodeError> {
    let provider = Arc::new(ring::default_provider());
    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(tls_err("protocol versions"))?;
    let builder = match client_cas {
        Some(pool) => builder.with_client_cert_verifier(client_verifier(pool, &provider)?),
        None => builder.with_no_client_auth(),
    };
    let config = builder
        .with_single_cert(identity.chain, identity.key)
        .map_err(tls_err("server certificate"))?;
    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hostnames() -> Vec<String> {
        vec!["node.test".to_string()]
    }

    #[test]
    fn server_pair_generated_when_both_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("admin.cert");
        let key = dir.path().join("admin.key");

        let identity = load_or_generate_server_identity(&cert, &key, &hostnames()).unwrap();
        assert_eq!(identity.chain.len(), 1);
        assert!(cert.exists() && key.exists());

        // A second start reuses the pair.
        let before = fs::read(&cert).unwrap();
        load_or_generate_server_identity(&cert, &key, &hostnames()).unwrap();
        assert_eq!(fs::read(&cert).unwrap(), before);
    }

    #[test]
    fn mismatched_pair_presence_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("admin.cert");
        let key = dir.path().join("admin.key");
        fs::write(&cert, "stale").unwrap();

        let err = load_or_generate_server_identity(&cert, &key, &hostnames()).err().unwrap();
        assert!(matches!(err, NodeError::Config(_)));
        assert!(!key.exists());
    }

    #[test]
    fn unprovisioned_pool_without_autogen() {
        let dir = tempfile::tempdir().unwrap();
        let pool = load_client_ca_pool(dir.path(), false).unwrap();
        assert!(matches!(pool, ClientCaPool::Unprovisioned));
        assert!(!dir.path().join(CLIENT_CA_FILE).exists());
    }

    #[test]
    fn autogen_writes_client_pair_and_ca_file() {
        let dir = tempfile::tempdir().unwrap();
        let pool = load_client_ca_pool(dir.path(), true).unwrap();
        match pool {
            ClientCaPool::Provisioned(roots) => assert_eq!(roots.len(), 1),
            other => panic!("expected provisioned pool, got {other:?}"),
        }
        let (cert, key) = autogen_client_paths(dir.path());
        assert!(cert.exists() && key.exists());
        assert_eq!(
            fs::read(&cert).unwrap(),
            fs::read(dir.path().join(CLIENT_CA_FILE)).unwrap()
        );
    }

    #[test]
    fn invalid_ca_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CLIENT_CA_FILE), "not a pem").unwrap();
        assert!(matches!(
            load_client_ca_pool(dir.path(), true),
            Err(NodeError::Config(_))
        ));
    }

    #[test]
    fn server_configs_build_for_every_policy() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("admin.cert");
        let key = dir.path().join("admin.key");
        let identity = || load_or_generate_server_identity(&cert, &key, &hostnames()).unwrap();

        server_config(identity(), None).unwrap();
        server_config(identity(), Some(ClientCaPool::Unprovisioned)).unwrap();
        let pool = load_client_ca_pool(dir.path(), true).unwrap();
        server_config(identity(), Some(pool)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn generated_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = autogen_client_paths(dir.path());
        generate_key_pair(&cert, &key, AUTOGEN_CLIENT_ISSUER, &[], true).unwrap();
        let mode = fs::metadata(&key).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
