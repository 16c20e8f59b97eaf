use std::{fs, io, path::Path};

use getset::Getters;
use serde::{Deserialize, Deserializer, Serialize};

use crate::LinuxaidResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The envelope every control-plane response is wrapped in. Only `data` drives decisions.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// Status code echoed by the API.
    #[serde(default)]
    pub status: i32,

    /// Whether the API considers the call successful.
    #[serde(default)]
    pub success: bool,

    /// The payload.
    pub data: Option<T>,

    /// Human readable message.
    #[serde(default)]
    pub message: String,

    /// Suggested resolution when something is wrong.
    #[serde(default)]
    pub resolution: String,

    /// Error detail.
    #[serde(default)]
    pub error_text: String,
}

/// Remote permission to perform disruptive maintenance now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ServiceWindow {
    /// Whether maintenance may start.
    #[getset(skip)]
    #[serde(default, deserialize_with = "null_as_default")]
    is_window_open: bool,

    /// Kind of window, forwarded verbatim when closing it.
    #[serde(default, deserialize_with = "null_as_default")]
    window_type: String,

    /// IANA zone the window's calendar date is computed in.
    #[serde(default, deserialize_with = "null_as_default")]
    timezone: String,
}

/// The agent's report of its most recent run, as uploaded to the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRunReport {
    /// When the run happened.
    #[serde(default)]
    pub time: String,

    /// `changed`, `unchanged` or `failed`.
    #[serde(default)]
    pub status: String,

    /// Whether the agent finished applying its catalog.
    #[serde(default)]
    pub transaction_completed: bool,

    /// Set when the agent has not written a report yet.
    #[serde(skip_deserializing)]
    pub is_last_run_yaml_file_not_present: bool,
}

/// Pending update counts from the security exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PackageUpdates {
    /// Packages with an update available.
    pub total_number_of_packages_with_update: u64,

    /// Whether one of them is the kernel.
    pub has_kernel_update: bool,
}

/// The body of a failed security exporter request.
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterErrorResponse {
    /// Output of the command the exporter ran.
    #[serde(default)]
    pub output: String,

    /// Error raised by the exporter.
    #[serde(default)]
    pub error: serde_json::Value,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ServiceWindow {
    /// Creates a window.
    pub fn new(is_open: bool, window_type: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self {
            is_window_open: is_open,
            window_type: window_type.into(),
            timezone: timezone.into(),
        }
    }

    /// Whether maintenance may start.
    pub fn is_open(&self) -> bool {
        self.is_window_open
    }
}

impl LastRunReport {
    /// Reads the agent's YAML run report.
    ///
    /// A missing file yields an empty report flagged with `is_last_run_yaml_file_not_present`.
    /// The agent tags the document with a Ruby class, which is ignored.
    pub fn load(path: impl AsRef<Path>) -> LinuxaidResult<Self> {
        let data = match fs::read_to_string(path.as_ref()) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    is_last_run_yaml_file_not_present: true,
                    ..Default::default()
                })
            }
            Err(e) => return Err(e.into()),
        };

        let value = match serde_yaml::from_str::<serde_yaml::Value>(&data)? {
            serde_yaml::Value::Tagged(tagged) => tagged.value,
            value => value,
        };

        Ok(serde_yaml::from_value(value)?)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Decodes `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
