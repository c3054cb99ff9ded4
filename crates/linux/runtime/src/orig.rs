//! Calls into the real memory primitives, bypassing any interception.
//!
//! Every function resolves its target once, on first use, and caches it for the lifetime of the
//! process. Failing to resolve is fatal: without the original there is nothing correct to fall
//! back to.

use std::mem;
use std::process;
use std::sync::OnceLock;

use libc::{c_int, c_void, intptr_t, off_t, size_t};

use crate::symbol;

macro_rules! original_call {
    ($(#[$meta:meta])* $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty) => {
        $(#[$meta])*
        pub unsafe fn $name($($arg: $ty),*) -> $ret {
            static ORIGINAL: OnceLock<unsafe extern "C" fn($($ty),*) -> $ret> = OnceLock::new();

            let original = *ORIGINAL.get_or_init(|| unsafe {
                mem::transmute::<usize, unsafe extern "C" fn($($ty),*) -> $ret>(
                    resolve_or_abort(stringify!($name))
                )
            });

            original($($arg),*)
        }
    };
}

original_call!(
    /// Calls the original `mmap` without triggering events.
    ///
    /// # Safety
    ///
    /// Same contract as `mmap(2)`. A `MAP_FIXED` request must not replace memory still in use.
    mmap(
        address: *mut c_void,
        size: size_t,
        prot: c_int,
        flags: c_int,
        fd: c_int,
        offset: off_t,
    ) -> *mut c_void
);

original_call!(
    /// Calls the original `munmap` without triggering events.
    ///
    /// # Safety
    ///
    /// Nothing may reference `address..address + size` once the range is unmapped.
    munmap(address: *mut c_void, size: size_t) -> c_int
);

original_call!(
    /// Calls the original `shmat` without triggering events.
    ///
    /// # Safety
    ///
    /// Same contract as `shmat(2)`. With `SHM_REMAP` the range at `shmaddr` must not be in use.
    shmat(shmid: c_int, shmaddr: *const c_void, shmflg: c_int) -> *mut c_void
);

original_call!(
    /// Calls the original `shmdt` without triggering events.
    ///
    /// # Safety
    ///
    /// `shmaddr` must be an attached segment that nothing references any more.
    shmdt(shmaddr: *const c_void) -> c_int
);

original_call!(
    /// Calls the original `sbrk` without triggering events.
    ///
    /// # Safety
    ///
    /// Moving the break must not take memory away from the heap allocator.
    sbrk(increment: intptr_t) -> *mut c_void
);

type MremapFn = unsafe extern "C" fn(*mut c_void, size_t, size_t, c_int, ...) -> *mut c_void;

/// Calls the original `mremap` without triggering events.
///
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
    static ORIGINAL: OnceLock<MremapFn> = OnceLock::new();

    let original = *ORIGINAL.get_or_init(|| unsafe {
        mem::transmute::<usize, MremapFn>(resolve_or_abort("mremap"))
    });

    original(address, old_size, new_size, flags)
}

fn resolve_or_abort(name: &'static str) -> usize {
    match symbol::lookup_next(name) {
        Ok(address) => address,
        Err(e) => {
            // Raw writes first, the logger might not be set up or might need the heap.
            write_stderr(b"membrane: could not resolve original ");
            write_stderr(name.as_bytes());
            write_stderr(b"\n");

            log::error!("Could not resolve original {}: {}", name, e);
            process::abort()
        }
    }
}

fn write_stderr(message: &[u8]) {
    unsafe {
        libc::write(libc::STDERR_FILENO, message.as_ptr() as *const c_void, message.len());
    }
}
