//! CLI argument definitions

use std::ffi::OsString;
use std::os::fd::RawFd;
use std::path::PathBuf;

use clap::Parser;
use nsenter_core::{IdSource, ProcessId};
use nsenter_namespace::{DirSource, EnterOptions, ForkMode, NamespaceKind};

#[derive(Parser, Debug)]
#[command(name = "nsenter")]
#[command(about = "Run a program with namespaces of other processes", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enter all namespaces
    #[arg(short = 'a', long)]
    pub all: bool,

    /// Target process to get namespaces from
    #[arg(short = 't', long, value_name = "pid")]
    pub target: Option<ProcessId>,

    /// Enter mount namespace
    #[arg(short = 'm', long, value_name = "file", num_args = 0..=1, require_equals = true)]
    pub mount: Option<Option<PathBuf>>,

    /// Enter UTS namespace (hostname etc)
    #[arg(short = 'u', long, value_name = "file", num_args = 0..=1, require_equals = true)]
    pub uts: Option<Option<PathBuf>>,

    /// Enter System V IPC namespace
    #[arg(short = 'i', long, value_name = "file", num_args = 0..=1, require_equals = true)]
    pub ipc: Option<Option<PathBuf>>,

    /// Enter network namespace
    #[arg(short = 'n', long, value_name = "file", num_args = 0..=1, require_equals = true)]
    pub net: Option<Option<PathBuf>>,

    /// Enter socket's network namespace (use with --target)
    #[arg(
        short = 'N',
        long,
        value_name = "fd",
        value_parser = clap::value_parser!(RawFd).range(0..)
    )]
    pub net_socket: Option<RawFd>,

    /// Enter pid namespace
    #[arg(short = 'p', long, value_name = "file", num_args = 0..=1, require_equals = true)]
    pub pid: Option<Option<PathBuf>>,

    /// Enter cgroup namespace
    #[arg(short = 'C', long, value_name = "file", num_args = 0..=1, require_equals = true)]
    pub cgroup: Option<Option<PathBuf>>,

    /// Enter user namespace
    #[arg(short = 'U', long, value_name = "file", num_args = 0..=1, require_equals = true)]
    pub user: Option<Option<PathBuf>>,

    /// Enter parent user namespace
    #[arg(long)]
    pub user_parent: bool,

    /// Enter time namespace
    #[arg(short = 'T', long, value_name = "file", num_args = 0..=1, require_equals = true)]
    pub time: Option<Option<PathBuf>>,

    /// Set uid in entered namespace
    #[arg(short = 'S', long = "setuid", value_name = "uid|follow")]
    pub uid: Option<IdSource>,

    /// Set gid in entered namespace
    #[arg(short = 'G', long = "setgid", value_name = "gid|follow")]
    pub gid: Option<IdSource>,

    /// Do not touch uids or gids
    #[arg(long)]
    pub preserve_credentials: bool,

    /// Retain capabilities granted in user namespaces
    #[arg(long)]
    pub keep_caps: bool,

    /// Set the root directory
    #[arg(short = 'r', long, value_name = "dir", num_args = 0..=1, require_equals = true)]
    pub root: Option<Option<PathBuf>>,

    /// Set the working directory
    #[arg(
        short = 'w',
        long,
        value_name = "dir",
        num_args = 0..=1,
        require_equals = true,
        conflicts_with = "wdns"
    )]
    pub wd: Option<Option<PathBuf>>,

    /// Set the working directory in namespace
    #[arg(short = 'W', long, value_name = "dir")]
    pub wdns: Option<PathBuf>,

    /// Inherit environment variables from target process
    #[arg(short = 'e', long)]
    pub env: bool,

    /// Do not fork before exec'ing <program>
    #[arg(short = 'F', long)]
    pub no_fork: bool,

    /// Join the cgroup of the target process
    #[arg(short = 'c', long)]
    pub join_cgroup: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Program to run, followed by its arguments; defaults to $SHELL
    #[arg(value_name = "program", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<OsString>,
}

impl Cli {
    /// Namespaces named on the command line, with their optional file
    pub fn namespaces(&self) -> impl Iterator<Item = (NamespaceKind, Option<&PathBuf>)> + '_ {
        [
            (NamespaceKind::User, &self.user),
            (NamespaceKind::Cgroup, &self.cgroup),
            (NamespaceKind::Ipc, &self.ipc),
            (NamespaceKind::Uts, &self.uts),
            (NamespaceKind::Net, &self.net),
            (NamespaceKind::Pid, &self.pid),
            (NamespaceKind::Mount, &self.mount),
            (NamespaceKind::Time, &self.time),
        ]
        .into_iter()
        .filter_map(|(kind, arg)| arg.as_ref().map(|file| (kind, file.as_ref())))
    }

    /// Scalar switches for the namespace plan
    #[must_use]
    pub fn options(&self) -> EnterOptions {
        EnterOptions {
            enter_all: self.all,
            preserve_credentials: self.preserve_credentials,
            keep_capabilities: self.keep_caps,
            fork: if self.no_fork {
                ForkMode::NoFork
            } else {
                ForkMode::Unspecified
            },
            join_cgroup: self.join_cgroup,
            use_parent_userns: self.user_parent,
            import_env: self.env,
            uid: self.uid,
            gid: self.gid,
        }
    }

    /// Source of the new root directory
    #[must_use]
    pub fn root_source(&self) -> Option<DirSource> {
        dir_source(self.root.as_ref())
    }

    /// Source of the new working directory
    #[must_use]
    pub fn wd_source(&self) -> Option<DirSource> {
        dir_source(self.wd.as_ref())
    }
}

fn dir_source(arg: Option<&Option<PathBuf>>) -> Option<DirSource> {
    arg.map(|dir| {
        dir.as_ref()
            .map_or(DirSource::Target, |path| DirSource::Path(path.clone()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_optional_file_arguments() {
        let cli = Cli::try_parse_from(["nsenter", "-t", "1", "-m", "--uts=/tmp/uts", "hostname"])
            .unwrap();
        let namespaces: Vec<_> = cli.namespaces().collect();
        assert_eq!(
            namespaces,
            vec![
                (NamespaceKind::Uts, Some(&PathBuf::from("/tmp/uts"))),
                (NamespaceKind::Mount, None),
            ]
        );
        assert_eq!(cli.command, vec![OsString::from("hostname")]);
    }

    #[test]
    fn test_trailing_arguments_keep_hyphens() {
        let cli = Cli::try_parse_from(["nsenter", "-t", "1", "-n", "--", "ip", "-br", "addr"])
            .unwrap();
        let expected: Vec<OsString> = ["ip", "-br", "addr"].map(OsString::from).into();
        assert_eq!(cli.command, expected);
    }

    #[test]
    fn test_id_sources() {
        let cli = Cli::try_parse_from(["nsenter", "-S", "follow", "-G", "100"]).unwrap();
        let options = cli.options();
        assert_eq!(options.uid, Some(IdSource::Follow));
        assert_eq!(options.gid, Some(IdSource::Value(100)));
    }

    #[test]
    fn test_directory_sources() {
        let cli = Cli::try_parse_from(["nsenter", "-r", "--wd=/srv"]).unwrap();
        assert_eq!(cli.root_source(), Some(DirSource::Target));
        assert_eq!(cli.wd_source(), Some(DirSource::Path("/srv".into())));
    }

    #[test]
    fn test_wd_conflicts_with_wdns() {
        assert!(Cli::try_parse_from(["nsenter", "-w", "-W", "/srv"]).is_err());
    }

    #[test]
    fn test_zero_target_is_rejected() {
        assert!(Cli::try_parse_from(["nsenter", "-t", "0", "-m"]).is_err());
    }

    #[test]
    fn test_net_socket_must_be_a_descriptor() {
        assert!(Cli::try_parse_from(["nsenter", "-t", "1", "--net-socket=-1"]).is_err());
        let cli = Cli::try_parse_from(["nsenter", "-t", "1", "--net-socket=3"]).unwrap();
        assert_eq!(cli.net_socket, Some(3));
    }

    #[test]
    fn test_no_fork_option() {
        let cli = Cli::try_parse_from(["nsenter", "-F"]).unwrap();
        assert_eq!(cli.options().fork, ForkMode::NoFork);
    }
}
