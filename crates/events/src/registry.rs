use std::mem;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Error;
use crate::handler::{is_same_handler, EventHandler};
use crate::kind::{EventKind, EventSet};

static EVENT_HANDLERS: OnceLock<HandlerRegistry> = OnceLock::new();

/// The process-wide registry every intercepted call dispatches against.
pub fn global() -> &'static HandlerRegistry {
    EVENT_HANDLERS.get_or_init(HandlerRegistry::new)
}

pub struct Registration {
    events: EventSet,
    priority: i32,
    handler: Arc<dyn EventHandler>,
}

impl Registration {
    pub fn events(&self) -> EventSet {
        self.events
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn handler(&self) -> &Arc<dyn EventHandler> {
        &self.handler
    }
}

/// Registered handlers, kept sorted by ascending priority. Handlers with equal priority stay in
/// registration order.
///
/// The write lock is never held across an allocation or a free. An allocator call could be
/// intercepted itself, and the dispatch it triggers would block on the lock held by this very
/// thread.
pub struct HandlerRegistry {
    registrations: RwLock<Vec<Registration>>,
}

impl HandlerRegistry {
    pub const fn new() -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes `handler` to `events`. Registering a handler that is already known extends its
    /// subscription instead of adding a second entry; the entry keeps its original priority.
    pub fn register(
        &self,
        events: EventSet,
        priority: i32,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), Error> {
        if events.is_empty() {
            return Err(Error::InvalidArgument);
        }

        let mut handler = Some(handler);
        loop {
            let required = {
                let mut registrations = self.write();
                let incoming = handler.as_ref().ok_or(Error::InvalidArgument)?;

                let existing = registrations
                    .iter_mut()
                    .find(|r| is_same_handler(&r.handler, incoming));

                if let Some(existing) = existing {
                    let previous = existing.priority;
                    existing.events |= events;
                    let merged = existing.events;
                    drop(registrations);

                    if previous != priority {
                        log::warn!(
                            "Handler already registered at priority {}, ignoring priority {}",
                            previous,
                            priority
                        );
                    }
                    log::debug!("Extended event handler subscription to {:?}", merged);
                    return Ok(());
                }

                if registrations.len() < registrations.capacity() {
                    let position = registrations
                        .iter()
                        .position(|r| r.priority > priority)
                        .unwrap_or(registrations.len());

                    registrations.insert(position, Registration {
                        events,
                        priority,
                        handler: handler.take().ok_or(Error::InvalidArgument)?,
                    });
                    drop(registrations);

                    log::debug!("Adding event handler for {:?} at priority {}", events, priority);
                    return Ok(());
                }

                registrations.len() + 1
            };

            self.grow(required);
        }
    }

    /// Removes `events` from the subscription of `handler`. The registration is dropped once it
    /// has no events left. Unknown handlers are ignored.
    pub fn unregister(&self, events: EventSet, handler: &Arc<dyn EventHandler>) {
        let mut removed = None;
        let remaining = {
            let mut registrations = self.write();
            let position = registrations
                .iter()
                .position(|r| is_same_handler(&r.handler, handler));
            let Some(position) = position else {
                return;
            };

            let registration = &mut registrations[position];
            registration.events = registration.events - events;
            let remaining = registration.events;

            if remaining.is_empty() {
                removed = Some(registrations.remove(position));
            }

            remaining
        };

        if removed.is_some() {
            log::debug!("Removing event handler");
        } else {
            log::debug!("Reduced event handler subscription to {:?}", remaining);
        }
    }

    /// Handlers subscribed to `kind`, in dispatch order. The chain holds the registry's read lock
    /// until it is dropped.
    pub fn chain_for(&self, kind: EventKind) -> Chain<'_> {
        Chain {
            kind,
            registrations: self.read(),
        }
    }

    /// Union of everything any handler is subscribed to.
    pub fn subscribed(&self) -> EventSet {
        self.read()
            .iter()
            .fold(EventSet::EMPTY, |set, r| set | r.events)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drops every registration. Meant for teardown.
    pub fn clear(&self) {
        let removed = mem::take(&mut *self.write());

        log::debug!("Cleared {} event handler(s)", removed.len());
    }

    /// Gives the registrations room for at least one more entry. The new buffer is allocated
    /// before taking the lock. If other threads filled the registry past `required` meanwhile, the
    /// buffer is thrown away unlocked and sized again.
    fn grow(&self, required: usize) {
        let mut required = required;

        loop {
            let mut replacement = Vec::with_capacity(required.max(4) * 2);

            let mut registrations = self.write();
            if registrations.len() < registrations.capacity() {
                drop(registrations);
                return;
            }

            if registrations.len() >= replacement.capacity() {
                required = registrations.len() + 1;
                drop(registrations);
                drop(replacement);
                continue;
            }

            replacement.extend(registrations.drain(..));
            mem::swap(&mut *registrations, &mut replacement);
            drop(registrations);

            // `replacement` now owns the old, empty buffer, which gets freed here, unlocked.
            drop(replacement);
            return;
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Registration>> {
        self.registrations.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Registration>> {
        self.registrations.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Chain<'a> {
    kind: EventKind,
    registrations: RwLockReadGuard<'a, Vec<Registration>>,
}

impl Chain<'_> {
    pub fn iter(&self) -> impl Iterator<Item = &Registration> + '_ {
        let kind = self.kind;
        self.registrations.iter().filter(move |r| r.events.contains(kind))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::Rng;

    use crate::error::Error;
    use crate::handler::{from_fn, is_same_handler, EventHandler};
    use crate::kind::{EventKind, EventSet};
    use crate::registry::HandlerRegistry;

    fn noop() -> Arc<dyn EventHandler> {
        from_fn(|_| {})
    }

    fn chain_positions(
        registry: &HandlerRegistry,
        kind: EventKind,
        handlers: &[Arc<dyn EventHandler>],
    ) -> Vec<usize> {
        registry
            .chain_for(kind)
            .iter()
            .map(|r| handlers.iter().position(|h| is_same_handler(h, r.handler())).unwrap())
            .collect()
    }

    #[test]
    fn empty_masks_are_rejected() {
        let registry = HandlerRegistry::new();
        let result = registry.register(EventSet::EMPTY, 0, noop());

        assert_eq!(result, Err(Error::InvalidArgument));
        assert!(registry.is_empty());
    }

    #[test]
    fn registering_the_same_handler_twice_merges_the_masks() {
        let registry = HandlerRegistry::new();
        let handler = noop();

        registry.register(EventKind::Mmap.into(), -1, handler.clone()).unwrap();
        registry.register(EventKind::Munmap.into(), 5, handler.clone()).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.subscribed(), EventKind::Mmap | EventKind::Munmap);

        let chain = registry.chain_for(EventKind::Munmap);
        let registration = chain.iter().next().unwrap();
        assert_eq!(registration.priority(), -1);
        assert_eq!(registration.events(), EventKind::Mmap | EventKind::Munmap);
    }

    #[test]
    fn distinct_handlers_are_kept_apart() {
        let registry = HandlerRegistry::new();

        registry.register(EventKind::Mmap.into(), 0, noop()).unwrap();
        registry.register(EventKind::Mmap.into(), 0, noop()).unwrap();

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn partial_unregister_keeps_the_remaining_events() {
        let registry = HandlerRegistry::new();
        let handler = noop();
        registry
            .register(EventKind::Mmap | EventKind::Munmap, 0, handler.clone())
            .unwrap();

        registry.unregister(EventKind::Mmap.into(), &handler);

        assert_eq!(registry.len(), 1);
        assert!(registry.chain_for(EventKind::Mmap).is_empty());
        assert!(!registry.chain_for(EventKind::Munmap).is_empty());
    }

    #[test]
    fn unregistering_every_event_removes_the_handler() {
        let registry = HandlerRegistry::new();
        let handler = noop();
        registry
            .register(EventKind::Mmap | EventKind::Munmap, 0, handler.clone())
            .unwrap();

        registry.unregister(EventKind::Mmap.into(), &handler);
        registry.unregister(EventKind::Munmap.into(), &handler);

        assert!(registry.is_empty());
        assert_eq!(Arc::strong_count(&handler), 1);
    }

    #[test]
    fn unregistering_unknown_handlers_is_a_no_op() {
        let registry = HandlerRegistry::new();
        let known = noop();
        registry.register(EventKind::Mmap.into(), 0, known.clone()).unwrap();

        registry.unregister(EventSet::ALL, &noop());
        registry.unregister(EventKind::Sbrk.into(), &known);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.subscribed(), EventKind::Mmap.into());
    }

    #[test]
    fn chains_are_sorted_by_priority_and_stable() {
        let registry = HandlerRegistry::new();
        let handlers = vec![noop(), noop(), noop()];

        registry.register(EventKind::Mmap.into(), -1, handlers[0].clone()).unwrap();
        registry.register(EventKind::Mmap.into(), 0, handlers[1].clone()).unwrap();
        registry.register(EventKind::Mmap.into(), -1, handlers[2].clone()).unwrap();

        assert_eq!(chain_positions(&registry, EventKind::Mmap, &handlers), vec![0, 2, 1]);
    }

    #[test]
    fn chains_only_contain_subscribed_handlers() {
        let registry = HandlerRegistry::new();
        let handlers = vec![noop(), noop(), noop()];

        registry.register(EventKind::Mmap.into(), 0, handlers[0].clone()).unwrap();
        registry.register(EventKind::VmMapped.into(), 0, handlers[1].clone()).unwrap();
        registry
            .register(EventKind::Mmap | EventKind::VmMapped, 0, handlers[2].clone())
            .unwrap();

        assert_eq!(chain_positions(&registry, EventKind::Mmap, &handlers), vec![0, 2]);
        assert_eq!(chain_positions(&registry, EventKind::VmMapped, &handlers), vec![1, 2]);
        assert!(registry.chain_for(EventKind::Shmdt).is_empty());
    }

    #[test]
    fn random_priorities_produce_an_ordered_stable_chain() {
        let mut rng = rand::thread_rng();
        let registry = HandlerRegistry::new();
        let mut handlers = Vec::new();
        let mut priorities = Vec::new();

        for _ in 0..64 {
            let handler = noop();
            let priority = rng.gen_range(-4..4);
            registry.register(EventKind::Munmap.into(), priority, handler.clone()).unwrap();
            handlers.push(handler);
            priorities.push(priority);
        }

        let order = chain_positions(&registry, EventKind::Munmap, &handlers);
        assert_eq!(order.len(), 64);

        for pair in order.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(priorities[a] <= priorities[b]);
            if priorities[a] == priorities[b] {
                assert!(a < b, "equal priorities must keep registration order");
            }
        }
    }

    #[test]
    fn growing_past_a_stale_size_keeps_spare_capacity() {
        let registry = HandlerRegistry::new();
        let handlers: Vec<_> = (0..20).map(|_| noop()).collect();
        for (priority, handler) in handlers.iter().enumerate() {
            registry.register(EventKind::Mmap.into(), priority as i32, handler.clone()).unwrap();
        }
        registry.write().shrink_to_fit();
        assert_eq!(registry.read().len(), registry.read().capacity());

        // Sized for a registry that has since been filled by other threads.
        registry.grow(1);

        assert!(registry.read().capacity() > registry.read().len());
        let order = chain_positions(&registry, EventKind::Mmap, &handlers);
        assert_eq!(order, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn clear_drops_every_registration() {
        let registry = HandlerRegistry::new();
        let handler = noop();
        registry.register(EventSet::ALL, 0, handler.clone()).unwrap();

        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(registry.subscribed(), EventSet::EMPTY);
        assert_eq!(Arc::strong_count(&handler), 1);
    }
}
