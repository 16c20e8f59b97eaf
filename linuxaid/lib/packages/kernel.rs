use std::{fs, io, path::Path};

use getset::Getters;
use linuxaid_utils::latest_version;

use crate::LinuxaidResult;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const KERNEL_IMAGE_PREFIX: &str = "vmlinuz-";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The newest kernel on disk next to the kernel the host is running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct KernelState {
    /// Release of the newest kernel image in the boot directory, empty when there is none.
    installed_version: String,

    /// Release of the running kernel.
    running_version: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl KernelState {
    /// Creates a kernel state.
    pub fn new(installed_version: impl Into<String>, running_version: impl Into<String>) -> Self {
        Self {
            installed_version: installed_version.into(),
            running_version: running_version.into(),
        }
    }

    /// Whether the host runs something other than its newest installed kernel.
    ///
    /// No installed kernel (containers) never counts as a change.
    pub fn has_changed(&self) -> bool {
        !self.installed_version.is_empty()
            && !self.running_version.is_empty()
            && self.installed_version != self.running_version
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Whether a reboot is warranted.
pub fn should_reboot(state: &KernelState, reboot_requested: bool) -> bool {
    reboot_requested && state.has_changed()
}

/// Release of the newest `vmlinuz-*` image in `boot_dir`, version sorted.
///
/// Returns an empty string when the directory or images are missing.
pub fn installed_kernel(boot_dir: impl AsRef<Path>) -> LinuxaidResult<String> {
    let entries = match fs::read_dir(boot_dir.as_ref()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => return Err(e.into()),
    };

    let mut releases = Vec::new();
    for entry in entries {
        let name = entry?.file_name();
        if let Some(release) = name
            .to_str()
            .and_then(|name| name.strip_prefix(KERNEL_IMAGE_PREFIX))
            .filter(|release| !release.is_empty())
        {
            releases.push(release.to_string());
        }
    }

    Ok(latest_version(releases).unwrap_or_default())
}

/// Release of the running kernel, as `uname -r` prints it.
pub fn running_kernel() -> LinuxaidResult<String> {
    let uts = nix::sys::utsname::uname().map_err(io::Error::from)?;
    Ok(uts.release().to_string_lossy().trim().to_string())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_reboot() {
        let changed = KernelState::new("5.10.0", "5.9.0");
        assert!(should_reboot(&changed, true));
        assert!(!should_reboot(&changed, false));

        let same = KernelState::new("6.11.0-3-generic", "6.11.0-3-generic");
        assert!(!should_reboot(&same, true));

        assert!(!should_reboot(&KernelState::new("", "6.8.0-45-generic"), true));
        assert!(!should_reboot(&KernelState::new("6.8.0-45-generic", ""), true));
        assert!(!should_reboot(&KernelState::default(), true));
    }

    #[test]
    fn test_installed_kernel_is_version_sorted() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for name in [
            "vmlinuz-6.8.0-45-generic",
            "vmlinuz-6.11.0-3-generic",
            "vmlinuz-6.9.0-9-generic",
            "initrd.img-6.11.0-3-generic",
            "config-6.11.0-3-generic",
            "vmlinuz-",
        ] {
            fs::write(dir.path().join(name), "")?;
        }

        assert_eq!(installed_kernel(dir.path())?, "6.11.0-3-generic");

        Ok(())
    }

    #[test]
    fn test_installed_kernel_missing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(installed_kernel(dir.path())?, "");
        assert_eq!(installed_kernel(dir.path().join("missing"))?, "");

        Ok(())
    }

    #[test]
    fn test_running_kernel() -> anyhow::Result<()> {
        assert!(!running_kernel()?.is_empty());
        Ok(())
    }
}
