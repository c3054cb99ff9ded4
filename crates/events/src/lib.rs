//! Memory event interception core.
//!
//! Subsystems that cache state about the address space (registration caches for zero-copy
//! transfers, for example) register handlers here to hear about `mmap`, `munmap`, `mremap`,
//! `shmat`, `shmdt` and `sbrk`, plus the derived `VM_MAPPED`/`VM_UNMAPPED` notifications.

use std::sync::Arc;

pub mod aggregate;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod gateway;
pub mod handler;
pub mod hooks;
pub mod kind;
pub mod registry;

pub use dispatch::Dispatcher;
pub use error::Error;
pub use event::{
    Event, MmapEvent, MremapEvent, MunmapEvent, SbrkEvent, ShmatEvent, ShmdtEvent, VmEvent,
};
pub use gateway::{Gateway, OriginalCalls};
pub use handler::{from_fn, EventHandler};
pub use kind::{EventKind, EventSet};
pub use registry::HandlerRegistry;

/// Installs a handler for memory events.
///
/// Handlers are called in order of ascending priority. Negative priorities run before the
/// original implementation, the rest after it.
pub fn set_event_handler(
    events: EventSet,
    priority: i32,
    handler: Arc<dyn EventHandler>,
) -> Result<(), Error> {
    registry::global().register(events, priority, handler)
}

/// Removes `events` from a handler's subscription. The handler is removed completely once none
/// are left.
pub fn unset_event_handler(events: EventSet, handler: &Arc<dyn EventHandler>) {
    registry::global().unregister(events, handler)
}

/// Drops every installed handler. Consumers call this during shutdown.
pub fn clear_event_handlers() {
    registry::global().clear()
}
