use std::{
    fs,
    path::{Path, PathBuf},
};

use getset::Getters;
use x509_parser::pem::parse_x509_pem;

use crate::{LinuxaidError, LinuxaidResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Who this host is to the control plane: its certname and the mutual-TLS material.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct HostIdentity {
    /// The host's certname, e.g. `web01.acme`.
    certname: String,

    /// PEM encoded host certificate.
    cert_path: PathBuf,

    /// PEM encoded host private key.
    key_path: PathBuf,
}

/// The places a host identity may be discovered from, in order of precedence.
#[derive(Debug, Clone, Default)]
pub struct IdentitySources {
    /// Certificate path from the environment.
    pub env_cert: Option<PathBuf>,

    /// Private key path from the environment.
    pub env_key: Option<PathBuf>,

    /// Directory of host certificates named `<certname>.pem`.
    pub certs_dir: PathBuf,

    /// Directory of host private keys named `<certname>.pem`.
    pub private_keys_dir: PathBuf,

    /// Certname given on the command line or in the environment.
    pub configured_certname: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl HostIdentity {
    /// Creates an identity from explicit parts.
    pub fn new(
        certname: impl Into<String>,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            certname: certname.into(),
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    /// Resolves the identity, first match wins:
    ///
    /// 1. certificate from the environment, certname taken from its subject common name
    /// 2. the first `*.pem` file in the private key directory
    /// 3. the configured certname
    pub fn resolve(sources: &IdentitySources) -> LinuxaidResult<Self> {
        if let Some(cert_path) = &sources.env_cert {
            let certname = common_name_from_cert_file(cert_path)?;
            let key_path = sources
                .env_key
                .clone()
                .unwrap_or_else(|| sources.private_keys_dir.join(format!("{certname}.pem")));
            tracing::debug!(certname = %certname, "host identity taken from environment certificate");
            return Ok(Self::new(certname, cert_path.clone(), key_path));
        }

        let certname = match certname_from_private_keys_dir(&sources.private_keys_dir) {
            Some(certname) => {
                tracing::debug!(certname = %certname, "host identity taken from private key directory");
                certname
            }
            None => sources
                .configured_certname
                .clone()
                .filter(|c| !c.is_empty())
                .ok_or_else(|| LinuxaidError::Identity("failed to find certname".to_string()))?,
        };

        Ok(Self::from_certname(
            certname,
            &sources.certs_dir,
            &sources.private_keys_dir,
        ))
    }

    /// Builds the identity for a certname using the agent's conventional file layout.
    pub fn from_certname(
        certname: impl Into<String>,
        certs_dir: impl AsRef<Path>,
        private_keys_dir: impl AsRef<Path>,
    ) -> Self {
        let certname = certname.into();
        let file_name = format!("{certname}.pem");
        Self {
            cert_path: certs_dir.as_ref().join(&file_name),
            key_path: private_keys_dir.as_ref().join(&file_name),
            certname,
        }
    }

    /// The customer the host belongs to: the second label of the certname.
    pub fn customer_id(&self) -> &str {
        customer_id(&self.certname)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the second dot-separated label of a certname, or `""` when there is none.
pub fn customer_id(certname: &str) -> &str {
    certname.split('.').nth(1).unwrap_or_default()
}

/// Reads the subject common name from a PEM encoded certificate.
pub fn common_name_from_cert_file(path: impl AsRef<Path>) -> LinuxaidResult<String> {
    let path = path.as_ref();
    let certificate_error = |reason: String| LinuxaidError::Certificate {
        path: path.to_path_buf(),
        reason,
    };

    let data = fs::read(path).map_err(|e| certificate_error(e.to_string()))?;
    let (_, pem) = parse_x509_pem(&data).map_err(|e| certificate_error(e.to_string()))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| certificate_error(e.to_string()))?;

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .ok_or_else(|| certificate_error("subject has no common name".to_string()))?;

    Ok(common_name.to_string())
}

/// Finds the certname from the first `*.pem` file in the private key directory.
fn certname_from_private_keys_dir(dir: &Path) -> Option<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(error = %e, path = %dir.display(), "failed to list private key directory");
            return None;
        }
    };

    let mut names = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(".pem"))
                .map(str::to_string)
        })
        .collect::<Vec<_>>();
    names.sort();

    names.into_iter().next()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
