use std::path::Path;

use sysinfo::Disks;

use crate::{LinuxaidError, LinuxaidResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Checks that `/boot` and `/` have more than the given free bytes, for those that are mounted.
pub fn check_disk_space(min_free_boot: u64, min_free_root: u64) -> LinuxaidResult<()> {
    let disks = Disks::new_with_refreshed_list();
    check_free_space(
        disks
            .list()
            .iter()
            .map(|disk| (disk.mount_point(), disk.available_space())),
        min_free_boot,
        min_free_root,
    )
}

/// Checks `(mount point, available bytes)` pairs against the thresholds.
pub fn check_free_space<'a>(
    mounts: impl IntoIterator<Item = (&'a Path, u64)>,
    min_free_boot: u64,
    min_free_root: u64,
) -> LinuxaidResult<()> {
    for (mount_point, available) in mounts {
        let minimum = if mount_point == Path::new("/boot") {
            min_free_boot
        } else if mount_point == Path::new("/") {
            min_free_root
        } else {
            continue;
        };

        tracing::debug!(mount_point = %mount_point.display(), available, minimum, "free disk space");
        if available <= minimum {
            return Err(LinuxaidError::InsufficientDiskSpace {
                mount_point: mount_point.display().to_string(),
                available,
            });
        }
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
