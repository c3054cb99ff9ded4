//! Derives address-space-wide mapped/unmapped notifications from the native operations.
//!
//! Unmapped notifications fire before the operation so observers can still inspect the range;
//! mapped notifications fire once the operation has succeeded. Neither can be vetoed.

use libc::{c_int, c_void};
use membrane_address::{Address, Region};

use crate::event::{Event, MmapEvent, MremapEvent, SbrkEvent, ShmatEvent, VmEvent, INVALID_ADDRESS};
use crate::kind::EventKind;
use crate::registry::HandlerRegistry;

const SHM_REMAP: c_int = 0o40000;

fn region(start: impl Into<Address>, size: usize) -> Option<Region> {
    if size == 0 {
        return None;
    }

    Some(Region::new(start, size))
}

/// A fixed mapping silently replaces whatever was mapped at its target.
pub fn mmap_replaced(event: &MmapEvent) -> Option<Region> {
    if event.flags & libc::MAP_FIXED == 0 {
        return None;
    }

    region(event.address, event.size)
}

pub fn mmap_mapped(event: &MmapEvent) -> Option<Region> {
    if !event.is_result_valid() {
        return None;
    }

    region(event.result, event.size)
}

pub fn munmap_unmapped(address: *mut c_void, size: usize) -> Option<Region> {
    region(address, size)
}

pub fn mremap_unmapped(address: *mut c_void, old_size: usize) -> Option<Region> {
    region(address, old_size)
}

pub fn mremap_mapped(event: &MremapEvent) -> Option<Region> {
    if !event.is_result_valid() {
        return None;
    }

    region(event.result, event.new_size)
}

/// Attaching with `SHM_REMAP` at a fixed address replaces the mapping underneath.
pub fn shmat_replaced(event: &ShmatEvent, segment_size: usize) -> Option<Region> {
    if event.shmflg & SHM_REMAP == 0 || event.shmaddr.is_null() {
        return None;
    }

    region(event.shmaddr, segment_size)
}

pub fn shmat_mapped(event: &ShmatEvent, segment_size: usize) -> Option<Region> {
    if !event.is_result_valid() {
        return None;
    }

    region(event.result, segment_size)
}

pub fn shmdt_unmapped(shmaddr: *const c_void, mapping_size: usize) -> Option<Region> {
    region(shmaddr, mapping_size)
}

/// Shrinking the heap releases the top `-increment` bytes below the current break.
pub fn sbrk_released(current_break: *mut c_void, increment: isize) -> Option<Region> {
    if increment >= 0 || current_break == INVALID_ADDRESS {
        return None;
    }

    let start = Address::from(current_break).offset_by(increment);
    region(start, increment.unsigned_abs())
}

/// Growing the heap maps `increment` bytes starting at the previous break, which `sbrk` returns.
pub fn sbrk_mapped(event: &SbrkEvent) -> Option<Region> {
    if event.increment <= 0 || !event.is_result_valid() {
        return None;
    }

    region(event.result, event.increment.unsigned_abs())
}

pub(crate) fn notify_mapped(registry: &HandlerRegistry, mapped: Option<Region>) {
    notify(registry, EventKind::VmMapped, |event| Event::VmMapped(event), mapped);
}

pub(crate) fn notify_unmapped(registry: &HandlerRegistry, unmapped: Option<Region>) {
    notify(registry, EventKind::VmUnmapped, |event| Event::VmUnmapped(event), unmapped);
}

/// Aggregate chains run in priority order regardless of sign. Every handler gets a fresh copy
/// of the range, so nothing a handler writes reaches the next one.
fn notify(
    registry: &HandlerRegistry,
    kind: EventKind,
    view: for<'a> fn(&'a mut VmEvent) -> Event<'a>,
    region: Option<Region>,
) {
    let Some(region) = region else {
        return;
    };

    let chain = registry.chain_for(kind);
    for registration in chain.iter() {
        let mut event = VmEvent {
            address: region.start.as_ptr(),
            size: region.size,
        };

        registration.handler().on_event(view(&mut event));
    }
}
