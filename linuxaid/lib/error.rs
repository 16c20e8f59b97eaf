use std::{
    error::Error,
    fmt::{self, Display},
    path::PathBuf,
};

use linuxaid_utils::UtilsError;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a linuxaid-related operation.
pub type LinuxaidResult<T> = Result<T, LinuxaidError>;

/// An error that occurred while keeping a host up to date.
#[derive(pretty_error_debug::Debug, Error)]
pub enum LinuxaidError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] AnyError),

    /// An error from one of the host utilities.
    #[error(transparent)]
    Utils(#[from] UtilsError),

    /// The host does not satisfy a requirement for running the workflow.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The host identity (certname, certificate, key) could not be determined.
    #[error("host identity error: {0}")]
    Identity(String),

    /// A certificate could not be read or parsed.
    #[error("certificate error at {path}: {reason}")]
    Certificate {
        /// The certificate file.
        path: PathBuf,

        /// What went wrong.
        reason: String,
    },

    /// A transport-level failure talking to a remote API.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A transport-level failure raised by the HTTP middleware stack.
    #[error("network error: {0}")]
    NetworkMiddleware(#[from] reqwest_middleware::Error),

    /// A remote API answered with an unexpected status code.
    #[error("unexpected response from {url} (status {status}): {body}")]
    Protocol {
        /// The requested URL.
        url: String,

        /// The HTTP status code.
        status: u16,

        /// The response body, kept for diagnosis.
        body: String,
    },

    /// A remote API answered with a body that could not be decoded.
    #[error("malformed response from {url}: {source}")]
    MalformedResponse {
        /// The requested URL.
        url: String,

        /// The decoding error.
        source: serde_json::Error,
    },

    /// The control plane refused to close the service window.
    #[error("failed to close service window (status {status}): {body}")]
    WindowClose {
        /// The HTTP status code.
        status: u16,

        /// The response body, kept for diagnosis.
        body: String,
    },

    /// The service window carried a timezone that is not a valid IANA zone name.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// A JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML deserialization error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An agent administrative command (enable/disable) failed.
    #[error("agent command `{command}` failed with exit code {exit_code:?}")]
    AgentCommand {
        /// The command line.
        command: String,

        /// The exit code, `None` when killed by a signal.
        exit_code: Option<i32>,
    },

    /// The package manager failed to upgrade the host.
    #[error("package upgrade `{command}` failed: exit status {exit_code:?}")]
    Upgrade {
        /// The command line.
        command: String,

        /// The exit code, `None` when killed by a signal.
        exit_code: Option<i32>,
    },

    /// Not enough free disk space to safely reboot into a new kernel.
    #[error("{mount_point} has {available} bytes of space left")]
    InsufficientDiskSpace {
        /// The mount point that is too full.
        mount_point: String,

        /// Remaining bytes.
        available: u64,
    },

    /// The reboot command could not be issued.
    #[error("reboot `{command}` failed: exit status {exit_code:?}")]
    Reboot {
        /// The command line.
        command: String,

        /// The exit code, `None` when killed by a signal.
        exit_code: Option<i32>,
    },
}

/// Where an error belongs in the failure taxonomy of the update workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal before any maintenance started; nothing to clean up.
    Precondition,

    /// Network or HTTP failure talking to the control plane.
    TransientApi,

    /// The configuration agent is not in a state that allows maintenance.
    Agent,

    /// The package manager failed.
    Upgrade,

    /// The service window could not be closed.
    WindowClose,

    /// Kernel detection or the pre-reboot checks failed.
    KernelCheck,

    /// The reboot command failed.
    Reboot,

    /// Anything that is logged and never propagated.
    BestEffort,
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LinuxaidError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> LinuxaidError {
        LinuxaidError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// Classifies the error into the workflow's failure taxonomy.
    ///
    /// I/O and other generic errors have no fixed class; the orchestrator attributes them to
    /// the state in which they happened.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            LinuxaidError::Precondition(_)
            | LinuxaidError::Identity(_)
            | LinuxaidError::Certificate { .. } => Some(ErrorKind::Precondition),
            LinuxaidError::Network(_)
            | LinuxaidError::NetworkMiddleware(_)
            | LinuxaidError::Protocol { .. }
            | LinuxaidError::MalformedResponse { .. } => Some(ErrorKind::TransientApi),
            LinuxaidError::WindowClose { .. } | LinuxaidError::InvalidTimezone(_) => {
                Some(ErrorKind::WindowClose)
            }
            LinuxaidError::AgentCommand { .. } => Some(ErrorKind::Agent),
            LinuxaidError::Upgrade { .. } => Some(ErrorKind::Upgrade),
            LinuxaidError::InsufficientDiskSpace { .. } => Some(ErrorKind::KernelCheck),
            LinuxaidError::Reboot { .. } => Some(ErrorKind::Reboot),
            LinuxaidError::Io(_)
            | LinuxaidError::Custom(_)
            | LinuxaidError::Utils(_)
            | LinuxaidError::Json(_)
            | LinuxaidError::Yaml(_) => None,
        }
    }

    /// The HTTP status code carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LinuxaidError::Protocol { status, .. } | LinuxaidError::WindowClose { status, .. } => {
                Some(*status)
            }
            LinuxaidError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `LinuxaidResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> LinuxaidResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Precondition => "precondition",
            ErrorKind::TransientApi => "transient_api",
            ErrorKind::Agent => "agent",
            ErrorKind::Upgrade => "upgrade",
            ErrorKind::WindowClose => "window_close",
            ErrorKind::KernelCheck => "kernel_check",
            ErrorKind::Reboot => "reboot",
            ErrorKind::BestEffort => "best_effort",
        };
        write!(f, "{}", name)
    }
}
