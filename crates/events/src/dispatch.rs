use libc::{c_int, c_void, off_t};
use membrane_address::Address;

use crate::aggregate;
use crate::event::{
    MmapEvent, MremapEvent, MunmapEvent, NativePayload, SbrkEvent, ShmatEvent, ShmdtEvent,
};
use crate::gateway::Gateway;
use crate::kind::EventKind;
use crate::registry::HandlerRegistry;

/// Runs intercepted memory operations through the handler chain.
///
/// Negative-priority handlers run first and may perform the operation themselves by setting a
/// valid result. When the chain reaches its first non-negative handler, or its end, the gateway
/// performs the operation unless a result is already there. The remaining handlers observe the
/// completed operation.
pub struct Dispatcher<'a, G> {
    registry: &'a HandlerRegistry,
    gateway: &'a G,
}

impl<'a, G: Gateway> Dispatcher<'a, G> {
    pub fn new(registry: &'a HandlerRegistry, gateway: &'a G) -> Self {
        Self { registry, gateway }
    }

    /// # Safety
    ///
    /// Same contract as `mmap(2)`. A `MAP_FIXED` request replaces whatever is mapped at
    /// `address`, so nothing may still reference that range.
    pub unsafe fn mmap(
        &self,
        address: *mut c_void,
        size: usize,
        prot: c_int,
        flags: c_int,
        fd: c_int,
        offset: off_t,
    ) -> *mut c_void {
        let mut event = MmapEvent::new(address, size, prot, flags, fd, offset);

        aggregate::notify_unmapped(self.registry, aggregate::mmap_replaced(&event));
        self.run(&mut event, |gateway, e| unsafe {
            e.result = gateway.mmap(e.address, e.size, e.prot, e.flags, e.fd, e.offset);
        });
        aggregate::notify_mapped(self.registry, aggregate::mmap_mapped(&event));

        event.result
    }

    /// # Safety
    ///
    /// Nothing may reference `address..address + size` once the range is unmapped.
    pub unsafe fn munmap(&self, address: *mut c_void, size: usize) -> c_int {
        let mut event = MunmapEvent::new(address, size);

        aggregate::notify_unmapped(self.registry, aggregate::munmap_unmapped(address, size));
        self.run(&mut event, |gateway, e| unsafe {
            e.result = gateway.munmap(e.address, e.size);
        });

        event.result
    }

    /// # Safety
    ///
    /// `address..address + old_size` must be a mapping owned by the caller. It may move, so no
    /// pointer into it stays valid afterwards.
    pub unsafe fn mremap(
        &self,
        address: *mut c_void,
        old_size: usize,
        new_size: usize,
        flags: c_int,
    ) -> *mut c_void {
        let mut event = MremapEvent::new(address, old_size, new_size, flags);

        aggregate::notify_unmapped(self.registry, aggregate::mremap_unmapped(address, old_size));
        self.run(&mut event, |gateway, e| unsafe {
            e.result = gateway.mremap(e.address, e.old_size, e.new_size, e.flags);
        });
        aggregate::notify_mapped(self.registry, aggregate::mremap_mapped(&event));

        event.result
    }

    /// # Safety
    ///
    /// Same contract as `shmat(2)`. With `SHM_REMAP` the range at `shmaddr` is replaced, so
    /// nothing may still reference it.
    pub unsafe fn shmat(&self, shmid: c_int, shmaddr: *const c_void, shmflg: c_int) -> *mut c_void {
        let mut event = ShmatEvent::new(shmid, shmaddr, shmflg);

        if self.is_observed(EventKind::VmUnmapped) {
            let segment_size = self.gateway.shm_segment_size(shmid);
            let replaced = aggregate::shmat_replaced(&event, segment_size);
            aggregate::notify_unmapped(self.registry, replaced);
        }

        self.run(&mut event, |gateway, e| unsafe {
            e.result = gateway.shmat(e.shmid, e.shmaddr, e.shmflg);
        });

        if self.is_observed(EventKind::VmMapped) {
            let segment_size = self.gateway.shm_segment_size(event.shmid);
            let mapped = aggregate::shmat_mapped(&event, segment_size);
            aggregate::notify_mapped(self.registry, mapped);
        }

        event.result
    }

    /// # Safety
    ///
    /// `shmaddr` must be an attached segment that nothing references any more.
    pub unsafe fn shmdt(&self, shmaddr: *const c_void) -> c_int {
        let mut event = ShmdtEvent::new(shmaddr);

        if self.is_observed(EventKind::VmUnmapped) {
            let mapping_size = self.gateway.mapping_size(Address::from(shmaddr));
            let detached = aggregate::shmdt_unmapped(shmaddr, mapping_size);
            aggregate::notify_unmapped(self.registry, detached);
        }

        self.run(&mut event, |gateway, e| unsafe {
            e.result = gateway.shmdt(e.shmaddr);
        });

        event.result
    }

    /// # Safety
    ///
    /// Moving the break must not pull memory out from under the heap allocator or anything else
    /// that still uses it.
    pub unsafe fn sbrk(&self, increment: isize) -> *mut c_void {
        let mut event = SbrkEvent::new(increment);

        if increment < 0 && self.is_observed(EventKind::VmUnmapped) {
            let current_break = self.gateway.sbrk(0);
            let released = aggregate::sbrk_released(current_break, increment);
            aggregate::notify_unmapped(self.registry, released);
        }

        self.run(&mut event, |gateway, e| unsafe {
            e.result = gateway.sbrk(e.increment);
        });
        aggregate::notify_mapped(self.registry, aggregate::sbrk_mapped(&event));

        event.result
    }

    /// Aggregate sizes that cost a query are only computed when someone listens.
    fn is_observed(&self, kind: EventKind) -> bool {
        !self.registry.chain_for(kind).is_empty()
    }

    fn run<P: NativePayload>(&self, payload: &mut P, original: impl FnOnce(&G, &mut P)) {
        let mut original = Some(original);

        let chain = self.registry.chain_for(P::KIND);
        for registration in chain.iter() {
            if registration.priority() >= 0 {
                if let Some(original) = original.take() {
                    self.finalize(payload, original);
                }
            }

            let before = payload.result_word();
            registration.handler().on_event(payload.as_event());

            debug_assert!(
                before.is_none() || payload.result_word() == before,
                "{} handler replaced a result that was already valid",
                P::KIND
            );
        }
        drop(chain);

        if let Some(original) = original.take() {
            self.finalize(payload, original);
        }
    }

    /// The gateway runs at most once per dispatch, and only if nobody produced a result yet. A
    /// failed original call leaves the invalid result in place and is not retried.
    fn finalize<P: NativePayload>(&self, payload: &mut P, original: impl FnOnce(&G, &mut P)) {
        if payload.result_word().is_none() {
            original(self.gateway, payload);
        }
    }
}
