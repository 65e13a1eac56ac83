//! System-wide constants and default paths.

use std::time::Duration;

/// procfs mount point.
pub const PROC_ROOT: &str = "/proc";

/// Cgroups v2 unified hierarchy mount point.
pub const CGROUP_V2_PATH: &str = "/sys/fs/cgroup";

/// Kernel-exposed highest valid capability number.
pub const CAP_LAST_CAP_PATH: &str = "/proc/sys/kernel/cap_last_cap";

/// Delay before retrying an `EAGAIN` write.
pub const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Shell used when no program is given and `$SHELL` is unset.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "NSENTER_LOG";

/// Application name used in diagnostics.
pub const APP_NAME: &str = "nsenter";
