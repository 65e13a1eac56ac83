//! Namespace entry and program execution

use anyhow::{Context, Result};
use nsenter_cgroup::{CgroupController, CgroupJoiner};
use nsenter_core::Error;
use nsenter_namespace::environ::import_environment;
use nsenter_namespace::relay::continue_as_child;
use nsenter_namespace::{
    ChildExit, Continuation, DirectorySwitch, EntrySequencer, NamespaceKind, NamespacePlan,
    NamespaceResolver, exec_program,
};
use nsenter_security::{CredentialPlan, raise_ambient_capabilities};
use tracing::debug;

use crate::cli::Cli;

/// Build the plan from `cli`, enter it and exec the program
///
/// Returns only in the parent of a forked child, with the child's exit.
pub fn execute(cli: &Cli) -> Result<ChildExit> {
    let options = cli.options();
    debug!(options = %serde_json::to_string(&options)?, "Parsed options");

    let mut plan = NamespacePlan::new(options);
    plan.target = cli.target;
    plan.net_socket = cli.net_socket;
    plan.wd_in_namespace.clone_from(&cli.wdns);

    for (kind, file) in cli.namespaces() {
        plan.registry
            .enable(kind, file.map(|path| path.as_path()))
            .map_err(|source| Error::NamespaceUnavailable {
                namespace: kind.short_name().to_string(),
                source,
            })?;
    }

    resolve(&mut plan, cli)?;

    // All descriptors are open; fix the final set
    let namespaces = plan.registry.mask_of(true);
    if namespaces.is_empty() {
        return Err(Error::NoNamespaceSpecified.into());
    }
    let fork = plan
        .options
        .fork
        .should_fork(namespaces.contains(NamespaceKind::Pid));

    let mut credentials = CredentialPlan::prepare(
        namespaces.contains(NamespaceKind::User),
        plan.options.preserve_credentials,
        plan.options.uid,
        plan.options.gid,
    );

    let entered = EntrySequencer::new().enter(&mut plan)?;
    plan.pidfd = None;

    DirectorySwitch::prepare(
        plan.root.take(),
        plan.cwd.take(),
        plan.wd_in_namespace.take(),
    )?
    .apply()?;

    if let Some(environ) = plan.environ.take() {
        import_environment(environ)?;
    }

    if let Some(procs) = plan.cgroup_procs.take() {
        CgroupJoiner::new(procs).join_self()?;
    }

    if let Some(source) = plan.id_source.take() {
        credentials.resolve_follow(&source)?;
    }

    if fork {
        if let Continuation::Parent(exit) = continue_as_child()? {
            return Ok(exit);
        }
    }

    credentials.apply()?;

    if plan.options.keep_capabilities && entered.contains(NamespaceKind::User) {
        raise_ambient_capabilities()?;
    }

    match exec_program(&cli.command)? {}
}

/// Open every descriptor the plan needs before any namespace is entered
fn resolve(plan: &mut NamespacePlan, cli: &Cli) -> Result<()> {
    let enter_all = plan.options.enter_all;
    let join_cgroup = plan.options.join_cgroup;
    let mut resolver = NamespaceResolver::new(plan);

    if enter_all {
        resolver.enable_all_usable()?;
    }
    resolver.resolve_namespaces()?;
    resolver.open_directories(cli.root_source().as_ref(), cli.wd_source().as_ref())?;
    resolver.open_target_sources()?;

    let cgroup_procs = if join_cgroup {
        let controller = CgroupController::default();
        controller.ensure_v2()?;
        let proc_cgroup = resolver.open_target_file("cgroup")?;
        Some(
            controller
                .open_procs_of(proc_cgroup)
                .context("failed to open cgroup.procs")?,
        )
    } else {
        None
    };

    resolver.derive()?;
    plan.cgroup_procs = cgroup_procs;
    Ok(())
}
