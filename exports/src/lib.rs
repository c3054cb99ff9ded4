pub mod address {
    pub use membrane_address::{align_up, Address, Region};
}

pub mod events {
    pub use membrane_events::*;
}

pub mod logging {
    pub use membrane_logging::*;
}

/// Direct calls to the real memory primitives. These never trigger events.
pub mod orig {
    pub use membrane_linux_runtime::orig::*;
}

pub mod runtime {
    pub use membrane_linux_runtime::memory::{mapping_size, page_size, shm_segment_size};
    pub use membrane_linux_runtime::symbol::{is_resolvable, lookup_next};
    pub use membrane_linux_runtime::ResolveError;
}

pub use membrane_events::{
    clear_event_handlers, set_event_handler, unset_event_handler, Event, EventHandler, EventKind,
    EventSet,
};

#[cfg(test)]
mod tests {
    use std::ptr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::events::{from_fn, hooks, Error};
    use crate::{orig, runtime, set_event_handler, unset_event_handler, Event, EventKind, EventSet};

    #[test]
    fn registration_rejects_empty_masks() {
        let result = set_event_handler(EventSet::EMPTY, 0, from_fn(|_| {}));

        assert_eq!(result, Err(Error::InvalidArgument));
    }

    #[test]
    fn original_calls_bypass_registered_handlers() {
        let size = runtime::page_size() * 5;
        let seen = Arc::new(AtomicUsize::new(0));
        let handler = {
            let seen = seen.clone();
            from_fn(move |event| {
                if let Event::Mmap(e) = event {
                    if e.size == size {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        };
        set_event_handler(EventKind::Mmap.into(), -1, handler.clone()).unwrap();

        let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
        let direct = unsafe { orig::mmap(ptr::null_mut(), size, libc::PROT_READ, flags, -1, 0) };
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        let intercepted =
            unsafe { hooks::mmap(ptr::null_mut(), size, libc::PROT_READ, flags, -1, 0) };
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        unset_event_handler(EventKind::Mmap.into(), &handler);
        unsafe {
            orig::munmap(direct, size);
            orig::munmap(intercepted, size);
        }
    }
}
