//! Import of a target process environment

#![allow(unsafe_code)]

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::os::unix::ffi::OsStrExt;

use nsenter_core::io::read_all;
use nsenter_core::{Error, Result};
use tracing::{debug, warn};

/// Parse a `/proc/<pid>/environ` buffer of NUL-separated `name=value`
/// records
///
/// Empty records are ignored. Records without `=`, or with an empty name,
/// are skipped with a warning.
#[must_use]
pub fn parse_environ(buf: &[u8]) -> Vec<(OsString, OsString)> {
    buf.split(|b| *b == 0)
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let lossy = String::from_utf8_lossy(record);
            let Some(eq) = record.iter().position(|b| *b == b'=') else {
                warn!(record = %lossy, "Skipping malformed environment record");
                return None;
            };
            if eq == 0 {
                warn!(record = %lossy, "Skipping environment record without a name");
                return None;
            }
            let name = OsStr::from_bytes(&record[..eq]).to_os_string();
            let value = OsStr::from_bytes(&record[eq + 1..]).to_os_string();
            Some((name, value))
        })
        .collect()
}

/// Read `environ` from `source` and replace the process environment with it
///
/// # Errors
/// Returns `EnvironmentImportFailed` if the source cannot be read.
pub fn import_environment(mut source: File) -> Result<()> {
    let buf = read_all(&mut source).map_err(|e| Error::EnvironmentImportFailed {
        message: format!("cannot read environment: {e}"),
    })?;
    let vars = parse_environ(&buf);
    replace_environment(&vars);
    debug!(count = vars.len(), "Imported target environment");
    Ok(())
}

/// Clear the process environment and set `vars`; later duplicates win
pub fn replace_environment(vars: &[(OsString, OsString)]) {
    let current: Vec<OsString> = std::env::vars_os().map(|(name, _)| name).collect();

    // SAFETY: nsenter is single-threaded; no other thread reads the
    // environment while it is rewritten.
    unsafe {
        for name in current {
            std::env::remove_var(name);
        }
        for (name, value) in vars {
            std::env::set_var(name, value);
        }
    }
}
