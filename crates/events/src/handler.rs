use std::sync::Arc;

use crate::event::Event;

/// Memory event callback.
///
/// Handlers run synchronously on the thread performing the memory operation, while the
/// operation is in flight. They must not allocate, nor call anything that might, because that
/// would re-enter event dispatch. Memory operations a handler needs for itself go through
/// [`membrane_linux_runtime::orig`].
///
/// Handlers must not register or unregister handlers from within a callback.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: Event<'_>);
}

impl<F> EventHandler for F
where
    F: Fn(Event<'_>) + Send + Sync,
{
    fn on_event(&self, event: Event<'_>) {
        self(event)
    }
}

/// Registrations are identified by the handler allocation, not by its contents.
pub(crate) fn is_same_handler(a: &Arc<dyn EventHandler>, b: &Arc<dyn EventHandler>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Wraps a closure as a shareable handler. Each call creates a distinct registration identity.
pub fn from_fn<F>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Event<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}
