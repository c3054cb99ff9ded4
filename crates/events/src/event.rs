//! Memory event parameters and results.
//!
//! Each native event carries the arguments of the call that triggered it plus a `result` which
//! starts out invalid. Handlers may edit any field; a handler may set `result` only while it is
//! still invalid, since a valid result means an earlier stage already performed the operation.

use std::ptr;

use libc::{c_int, c_void, off_t};

use crate::kind::EventKind;

/// Invalid result of the address-returning operations.
pub const INVALID_ADDRESS: *mut c_void = libc::MAP_FAILED;

/// Invalid result of the status-returning operations.
pub const INVALID_STATUS: c_int = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmapEvent {
    pub result: *mut c_void,
    pub address: *mut c_void,
    pub size: usize,
    pub prot: c_int,
    pub flags: c_int,
    pub fd: c_int,
    pub offset: off_t,
}

impl MmapEvent {
    pub fn new(
        address: *mut c_void,
        size: usize,
        prot: c_int,
        flags: c_int,
        fd: c_int,
        offset: off_t,
    ) -> Self {
        Self { result: INVALID_ADDRESS, address, size, prot, flags, fd, offset }
    }

    pub fn is_result_valid(&self) -> bool {
        self.result != INVALID_ADDRESS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MunmapEvent {
    pub result: c_int,
    pub address: *mut c_void,
    pub size: usize,
}

impl MunmapEvent {
    pub fn new(address: *mut c_void, size: usize) -> Self {
        Self { result: INVALID_STATUS, address, size }
    }

    pub fn is_result_valid(&self) -> bool {
        self.result != INVALID_STATUS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MremapEvent {
    pub result: *mut c_void,
    pub address: *mut c_void,
    pub old_size: usize,
    pub new_size: usize,
    pub flags: c_int,
}

impl MremapEvent {
    pub fn new(address: *mut c_void, old_size: usize, new_size: usize, flags: c_int) -> Self {
        Self { result: INVALID_ADDRESS, address, old_size, new_size, flags }
    }

    pub fn is_result_valid(&self) -> bool {
        self.result != INVALID_ADDRESS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmatEvent {
    pub result: *mut c_void,
    pub shmid: c_int,
    pub shmaddr: *const c_void,
    pub shmflg: c_int,
}

impl ShmatEvent {
    pub fn new(shmid: c_int, shmaddr: *const c_void, shmflg: c_int) -> Self {
        Self { result: INVALID_ADDRESS, shmid, shmaddr, shmflg }
    }

    pub fn is_result_valid(&self) -> bool {
        self.result != INVALID_ADDRESS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmdtEvent {
    pub result: c_int,
    pub shmaddr: *const c_void,
}

impl ShmdtEvent {
    pub fn new(shmaddr: *const c_void) -> Self {
        Self { result: INVALID_STATUS, shmaddr }
    }

    pub fn is_result_valid(&self) -> bool {
        self.result != INVALID_STATUS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbrkEvent {
    pub result: *mut c_void,
    pub increment: isize,
}

impl SbrkEvent {
    pub fn new(increment: isize) -> Self {
        Self { result: INVALID_ADDRESS, increment }
    }

    pub fn is_result_valid(&self) -> bool {
        self.result != INVALID_ADDRESS
    }
}

/// Read-only notification that a range was mapped into or unmapped from the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmEvent {
    pub address: *mut c_void,
    pub size: usize,
}

impl Default for VmEvent {
    fn default() -> Self {
        Self { address: ptr::null_mut(), size: 0 }
    }
}

/// The event handed to a handler: a mutable view of the one payload active for this dispatch.
#[derive(Debug)]
pub enum Event<'a> {
    Mmap(&'a mut MmapEvent),
    Munmap(&'a mut MunmapEvent),
    Mremap(&'a mut MremapEvent),
    Shmat(&'a mut ShmatEvent),
    Shmdt(&'a mut ShmdtEvent),
    Sbrk(&'a mut SbrkEvent),
    VmMapped(&'a mut VmEvent),
    VmUnmapped(&'a mut VmEvent),
}

impl Event<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Mmap(_) => EventKind::Mmap,
            Event::Munmap(_) => EventKind::Munmap,
            Event::Mremap(_) => EventKind::Mremap,
            Event::Shmat(_) => EventKind::Shmat,
            Event::Shmdt(_) => EventKind::Shmdt,
            Event::Sbrk(_) => EventKind::Sbrk,
            Event::VmMapped(_) => EventKind::VmMapped,
            Event::VmUnmapped(_) => EventKind::VmUnmapped,
        }
    }

    /// Whether an earlier stage has already produced the result. Aggregate events have none.
    pub fn is_result_valid(&self) -> bool {
        match self {
            Event::Mmap(e) => e.is_result_valid(),
            Event::Munmap(e) => e.is_result_valid(),
            Event::Mremap(e) => e.is_result_valid(),
            Event::Shmat(e) => e.is_result_valid(),
            Event::Shmdt(e) => e.is_result_valid(),
            Event::Sbrk(e) => e.is_result_valid(),
            Event::VmMapped(_) | Event::VmUnmapped(_) => false,
        }
    }
}

/// Payload of a native event, i.e. one that carries a result.
pub(crate) trait NativePayload {
    const KIND: EventKind;

    fn as_event(&mut self) -> Event<'_>;

    /// The result as a raw word, or `None` while it is invalid.
    fn result_word(&self) -> Option<usize>;
}

macro_rules! native_payload {
    ($payload:ident, $variant:ident) => {
        impl NativePayload for $payload {
            const KIND: EventKind = EventKind::$variant;

            fn as_event(&mut self) -> Event<'_> {
                Event::$variant(self)
            }

            fn result_word(&self) -> Option<usize> {
                if self.is_result_valid() {
                    Some(self.result as usize)
                } else {
                    None
                }
            }
        }
    };
}

native_payload!(MmapEvent, Mmap);
native_payload!(MunmapEvent, Munmap);
native_payload!(MremapEvent, Mremap);
native_payload!(ShmatEvent, Shmat);
native_payload!(ShmdtEvent, Shmdt);
native_payload!(SbrkEvent, Sbrk);
