use libc::{c_int, c_void, off_t};
use membrane_address::Address;
use membrane_linux_runtime::{memory, orig};

/// The stage that performs a memory operation for real once no handler has.
///
/// Besides the operations themselves it answers the two address-space questions needed to
/// describe shared memory attachments, since neither is visible from the call arguments.
pub trait Gateway {
    /// # Safety
    ///
    /// Same contract as the libc function of the same name.
    unsafe fn mmap(
        &self,
        address: *mut c_void,
        size: usize,
        prot: c_int,
        flags: c_int,
        fd: c_int,
        offset: off_t,
    ) -> *mut c_void;

    /// # Safety
    ///
    /// Same contract as the libc function of the same name.
    unsafe fn munmap(&self, address: *mut c_void, size: usize) -> c_int;

    /// # Safety
    ///
    /// Same contract as the libc function of the same name.
    unsafe fn mremap(
        &self,
        address: *mut c_void,
        old_size: usize,
        new_size: usize,
        flags: c_int,
    ) -> *mut c_void;

    /// # Safety
    ///
    /// Same contract as the libc function of the same name.
    unsafe fn shmat(&self, shmid: c_int, shmaddr: *const c_void, shmflg: c_int) -> *mut c_void;

    /// # Safety
    ///
    /// Same contract as the libc function of the same name.
    unsafe fn shmdt(&self, shmaddr: *const c_void) -> c_int;

    /// # Safety
    ///
    /// Same contract as the libc function of the same name.
    unsafe fn sbrk(&self, increment: isize) -> *mut c_void;

    /// Page-rounded size of shared memory segment `shmid`, 0 if unknown.
    fn shm_segment_size(&self, shmid: c_int) -> usize;

    /// Bytes from `address` to the end of its mapping, 0 if unmapped.
    fn mapping_size(&self, address: Address) -> usize;
}

/// The real, unintercepted libc implementations.
#[derive(Debug, Default, Clone, Copy)]
pub struct OriginalCalls;

impl Gateway for OriginalCalls {
    unsafe fn mmap(
        &self,
        address: *mut c_void,
        size: usize,
        prot: c_int,
        flags: c_int,
        fd: c_int,
        offset: off_t,
    ) -> *mut c_void {
        orig::mmap(address, size, prot, flags, fd, offset)
    }

    unsafe fn munmap(&self, address: *mut c_void, size: usize) -> c_int {
        orig::munmap(address, size)
    }

    unsafe fn mremap(
        &self,
        address: *mut c_void,
        old_size: usize,
        new_size: usize,
        flags: c_int,
    ) -> *mut c_void {
        orig::mremap(address, old_size, new_size, flags)
    }

    unsafe fn shmat(&self, shmid: c_int, shmaddr: *const c_void, shmflg: c_int) -> *mut c_void {
        orig::shmat(shmid, shmaddr, shmflg)
    }

    unsafe fn shmdt(&self, shmaddr: *const c_void) -> c_int {
        orig::shmdt(shmaddr)
    }

    unsafe fn sbrk(&self, increment: isize) -> *mut c_void {
        orig::sbrk(increment)
    }

    fn shm_segment_size(&self, shmid: c_int) -> usize {
        memory::shm_segment_size(shmid)
    }

    fn mapping_size(&self, address: Address) -> usize {
        memory::mapping_size(address)
    }
}
