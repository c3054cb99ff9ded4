//! Entry points for intercepted calls.
//!
//! Whatever redirects the process's `mmap`, `munmap` and friends lands here. Each entry point
//! dispatches against the global registry and falls through to the original implementation.

use libc::{c_int, c_void, intptr_t, off_t, size_t};

use crate::dispatch::Dispatcher;
use crate::gateway::OriginalCalls;
use crate::registry;

fn dispatcher() -> Dispatcher<'static, OriginalCalls> {
    static ORIGINAL_CALLS: OriginalCalls = OriginalCalls;
    Dispatcher::new(registry::global(), &ORIGINAL_CALLS)
}

/// # Safety
///
/// Same contract as `mmap(2)`. A `MAP_FIXED` request must not replace memory that is still in use.
pub unsafe fn mmap(
    address: *mut c_void,
    size: size_t,
    prot: c_int,
    flags: c_int,
    fd: c_int,
    offset: off_t,
) -> *mut c_void {
    dispatcher().mmap(address, size, prot, flags, fd, offset)
}

/// # Safety
///
/// Nothing may reference `address..address + size` once the range is unmapped.
pub unsafe fn munmap(address: *mut c_void, size: size_t) -> c_int {
    dispatcher().munmap(address, size)
}

/// # Safety
///
/// `address..address + old_size` must be a mapping the caller owns. Pointers into it are invalid
/// afterwards.
pub unsafe fn mremap(
    address: *mut c_void,
    old_size: size_t,
    new_size: size_t,
    flags: c_int,
) -> *mut c_void {
    dispatcher().mremap(address, old_size, new_size, flags)
}

/// # Safety
///
/// Same contract as `shmat(2)`. With `SHM_REMAP` the range at `shmaddr` must not be in use.
pub unsafe fn shmat(shmid: c_int, shmaddr: *const c_void, shmflg: c_int) -> *mut c_void {
    dispatcher().shmat(shmid, shmaddr, shmflg)
}

/// # Safety
///
/// `shmaddr` must be an attached segment that nothing references any more.
pub unsafe fn shmdt(shmaddr: *const c_void) -> c_int {
    dispatcher().shmdt(shmaddr)
}

/// # Safety
///
/// Moving the break must not take memory away from the heap allocator.
pub unsafe fn sbrk(increment: intptr_t) -> *mut c_void {
    dispatcher().sbrk(increment)
}
