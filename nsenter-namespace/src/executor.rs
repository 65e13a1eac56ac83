//! Replacing the process image with the requested program

use std::convert::Infallible;
use std::ffi::{CString, OsString};
use std::os::unix::ffi::OsStringExt;

use nix::unistd::execvp;
use nsenter_core::constants::DEFAULT_SHELL;
use nsenter_core::{Error, Result};
use tracing::{debug, error};

/// Program and arguments to run; an empty `argv` means the user's shell
///
/// The shell is `$SHELL`, falling back to [`DEFAULT_SHELL`].
#[must_use]
pub fn resolve_command(argv: &[OsString]) -> Vec<OsString> {
    if argv.is_empty() {
        let shell = std::env::var_os("SHELL")
            .filter(|shell| !shell.is_empty())
            .unwrap_or_else(|| DEFAULT_SHELL.into());
        vec![shell]
    } else {
        argv.to_vec()
    }
}

fn to_cstrings(argv: Vec<OsString>) -> Result<Vec<CString>> {
    argv.into_iter()
        .map(|arg| {
            CString::new(arg.into_vec()).map_err(|e| {
                Error::invalid_config(format!("argument contains a NUL byte: {e}"))
            })
        })
        .collect()
}

/// `execvp(argv[0], argv)`; returns only on failure
///
/// # Errors
/// Returns `InvalidConfig` for arguments containing NUL, `ExecFailed` if the
/// exec itself fails.
pub fn exec_program(argv: &[OsString]) -> Result<Infallible> {
    let args = to_cstrings(resolve_command(argv))?;
    let program = args
        .first()
        .ok_or_else(|| Error::invalid_config("no program to execute"))?;
    let name = program.to_string_lossy().into_owned();

    debug!(program = %name, args = args.len(), "Executing");
    let source = match execvp(program, &args) {
        Ok(never) => match never {},
        Err(e) => e,
    };
    error!(program = %name, error = %source, "exec failed");
    Err(Error::ExecFailed {
        program: name,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_command_keeps_argv() {
        let argv: Vec<OsString> = vec!["echo".into(), "hello".into()];
        assert_eq!(resolve_command(&argv), argv);
    }

    #[test]
    fn test_resolve_command_defaults_to_shell() {
        let argv = resolve_command(&[]);
        assert_eq!(argv.len(), 1);
        assert!(!argv[0].is_empty());
    }

    #[test]
    fn test_nul_argument_is_rejected() {
        let err = exec_program(&["ec\0ho".into()]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_missing_program_fails() {
        let err = exec_program(&["/nonexistent/program".into()]).unwrap_err();
        match err {
            Error::ExecFailed { program, source } => {
                assert_eq!(program, "/nonexistent/program");
                assert_eq!(source, nix::errno::Errno::ENOENT);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
