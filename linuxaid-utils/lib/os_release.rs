//! Host identity from `os-release` and other environment files.

use std::{collections::HashMap, env, path::Path};

use crate::{UtilsError, UtilsResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The operating-system identity of the host.
///
/// Values already present in the process environment take precedence over the file, the same
/// way a shell that sources `/etc/os-release` after exporting `ID` would behave.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    /// Lowercase distribution identifier, e.g. `ubuntu`.
    pub id: Option<String>,

    /// Human readable distribution name.
    pub name: Option<String>,

    /// Version including the codename.
    pub version: Option<String>,

    /// Machine readable version, e.g. `22.04`.
    pub version_id: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl OsRelease {
    /// Reads the given `os-release` file, overlaying values from the process environment.
    pub fn load(path: impl AsRef<Path>) -> UtilsResult<Self> {
        let path = path.as_ref();
        let iter = dotenvy::from_path_iter(path).map_err(|source| UtilsError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;

        let mut values = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|source| UtilsError::EnvFile {
                path: path.to_path_buf(),
                source,
            })?;
            values.insert(key, value);
        }

        Ok(Self::from_values(values, |key| env::var(key).ok()))
    }

    /// Builds the identity from parsed file values and an environment lookup.
    pub fn from_values(
        mut file: HashMap<String, String>,
        lookup_env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut take = |key: &str| lookup_env(key).or_else(|| file.remove(key));
        Self {
            id: take("ID"),
            name: take("NAME"),
            version: take("VERSION"),
            version_id: take("VERSION_ID"),
        }
    }

    /// The major release, i.e. everything before the first `.` of `VERSION_ID`.
    pub fn major_release(&self) -> Option<&str> {
        self.version_id
            .as_deref()
            .map(|v| v.split_once('.').map_or(v, |(major, _)| major))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Loads an optional environment file into the process environment.
///
/// Existing variables are not overridden. Returns `false` when the file does not exist.
pub fn load_env_file_if_exists(path: impl AsRef<Path>) -> UtilsResult<bool> {
    let path = path.as_ref();
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => {
            tracing::debug!("environment file {} not found, skipping", path.display());
            Ok(false)
        }
        Err(source) => Err(UtilsError::EnvFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
