//! Raw syscalls and ioctls nix does not wrap
//!
//! Every function here hands back an [`OwnedFd`] so descriptors are closed
//! by scope.

#![allow(unsafe_code)]

use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::sched::CloneFlags;
use nsenter_core::ProcessId;

use crate::kind::NamespaceMask;

// NS_GET_USERNS: owning user namespace of a namespace fd
nix::ioctl_none!(ns_get_userns, 0xb7, 0x1);

// PIDFD_GET_USER_NAMESPACE (pidfs, Linux 6.11); the kernel rejects any
// argument but 0
nix::ioctl_write_int_bad!(pidfd_get_user_namespace, nix::request_code_none!(0xFF, 9));

// SIOCGSKNS: network namespace of a socket
nix::ioctl_none_bad!(siocgskns, 0x894C);

fn take_fd(raw: libc::c_long) -> nix::Result<OwnedFd> {
    let raw = Errno::result(raw)?;
    let raw = RawFd::try_from(raw).map_err(|_| Errno::EBADF)?;
    // SAFETY: the kernel just returned this descriptor to us and nothing
    // else owns it.
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}

/// `pidfd_open(2)` for `pid`
pub fn pidfd_open(pid: ProcessId) -> nix::Result<OwnedFd> {
    // SAFETY: plain syscall with integer arguments.
    let raw = unsafe { libc::syscall(libc::SYS_pidfd_open, pid.as_raw(), 0) };
    take_fd(raw)
}

/// `pidfd_getfd(2)`: duplicate descriptor `target_fd` of the pidfd's process
pub fn pidfd_getfd(pidfd: BorrowedFd<'_>, target_fd: RawFd) -> nix::Result<OwnedFd> {
    // SAFETY: plain syscall with integer arguments.
    let raw = unsafe { libc::syscall(libc::SYS_pidfd_getfd, pidfd.as_raw_fd(), target_fd, 0) };
    take_fd(raw)
}

/// User namespace that owns the namespace referred to by `fd`
pub fn parent_user_namespace(fd: BorrowedFd<'_>) -> nix::Result<OwnedFd> {
    // SAFETY: NS_GET_USERNS takes no argument and returns a new descriptor.
    let raw = unsafe { ns_get_userns(fd.as_raw_fd()) }?;
    take_fd(raw.into())
}

/// User namespace of the process behind `pidfd`
pub fn pidfd_user_namespace(pidfd: BorrowedFd<'_>) -> nix::Result<OwnedFd> {
    // SAFETY: the argument is the integer 0; the ioctl returns a new
    // descriptor.
    let raw = unsafe { pidfd_get_user_namespace(pidfd.as_raw_fd(), 0) }?;
    take_fd(raw.into())
}

/// Network namespace of the socket `sock`
pub fn socket_net_namespace(sock: BorrowedFd<'_>) -> nix::Result<OwnedFd> {
    // SAFETY: SIOCGSKNS takes no argument and returns a new descriptor.
    let raw = unsafe { siocgskns(sock.as_raw_fd()) }?;
    take_fd(raw.into())
}

/// `setns(2)`: join every namespace in `mask` through `fd`
///
/// `fd` is either a namespace file (one kind) or a pidfd (any mask).
pub fn setns(fd: BorrowedFd<'_>, mask: NamespaceMask) -> nix::Result<()> {
    nix::sched::setns(fd, CloneFlags::from_bits_retain(mask.bits()))
}
