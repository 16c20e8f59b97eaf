use std::fmt::{self, Display};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The package-management families linuxaid knows how to upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistributionFamily {
    /// Ubuntu and Debian, upgraded with `apt-get`.
    Debian,

    /// SUSE Linux Enterprise, upgraded with `zypper`.
    Suse,

    /// CentOS and Red Hat Enterprise Linux, upgraded with `yum`.
    RedHat,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DistributionFamily {
    /// Maps an `os-release` `ID` onto its family. Matching ignores case.
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "ubuntu" | "debian" => Some(Self::Debian),
            "sles" => Some(Self::Suse),
            "centos" | "rhel" => Some(Self::RedHat),
            _ => None,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for DistributionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debian => write!(f, "debian"),
            Self::Suse => write!(f, "suse"),
            Self::RedHat => write!(f, "redhat"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
