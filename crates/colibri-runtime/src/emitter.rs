#![forbid(unsafe_code)]

//! A small named-event emitter.
//!
//! Listeners are registered per event name and receive the payload by
//! reference. [`EventEmitter::on`] returns a [`Subscription`] that removes
//! the listener when dropped, so a component can tie a listener's lifetime
//! to its own by keeping the subscription in its setup state.
//!
//! Emitting calls listeners in registration order. A listener removed by
//! an earlier listener during the same emit is not called.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Identity of one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener<E> {
    id: ListenerId,
    event: String,
    once: bool,
    active: Cell<bool>,
    handler: Box<dyn Fn(&E)>,
}

struct Registry<E> {
    next: Cell<u64>,
    listeners: RefCell<Vec<Rc<Listener<E>>>>,
}

impl<E> Registry<E> {
    fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| {
            if l.id == id {
                l.active.set(false);
                false
            } else {
                true
            }
        });
        listeners.len() != before
    }
}

/// Named-event emitter carrying payloads of type `E`.
///
/// Cloning shares the listener registry.
pub struct EventEmitter<E> {
    registry: Rc<Registry<E>>,
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self {
            registry: Rc::new(Registry {
                next: Cell::new(1),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }
}

impl<E> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.registry.listeners.borrow().len())
            .finish()
    }
}

impl<E: 'static> EventEmitter<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, event: &str, once: bool, handler: Box<dyn Fn(&E)>) -> Subscription {
        let id = ListenerId(self.registry.next.get());
        self.registry.next.set(id.0 + 1);
        self.registry.listeners.borrow_mut().push(Rc::new(Listener {
            id,
            event: event.to_owned(),
            once,
            active: Cell::new(true),
            handler,
        }));
        let registry: Rc<dyn Unsubscribe> = self.registry.clone();
        Subscription {
            id,
            registry: Some(Rc::downgrade(&registry)),
        }
    }

    /// Listen for `event` until the subscription is dropped.
    pub fn on(&self, event: &str, handler: impl Fn(&E) + 'static) -> Subscription {
        self.register(event, false, Box::new(handler))
    }

    /// Listen for the next `event` only.
    pub fn once(&self, event: &str, handler: impl Fn(&E) + 'static) -> Subscription {
        self.register(event, true, Box::new(handler))
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        self.registry.remove(id)
    }

    /// Call every listener of `event` with `payload`. Returns how many ran.
    pub fn emit(&self, event: &str, payload: &E) -> usize {
        let matching: Vec<Rc<Listener<E>>> = self
            .registry
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event == event)
            .cloned()
            .collect();
        let mut called = 0;
        for listener in matching {
            if !listener.active.get() {
                continue;
            }
            if listener.once {
                self.registry.remove(listener.id);
            }
            (listener.handler)(payload);
            called += 1;
        }
        tracing::trace!(message = "runtime.emit", event, called);
        called
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event == event)
            .count()
    }

    /// Remove every listener.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.registry.listeners.borrow_mut());
        for listener in &removed {
            listener.active.set(false);
        }
    }
}

trait Unsubscribe {
    fn unsubscribe(&self, id: ListenerId);
}

impl<E> Unsubscribe for Registry<E> {
    fn unsubscribe(&self, id: ListenerId) {
        self.remove(id);
    }
}

/// Removes its listener when dropped.
#[must_use = "dropping a Subscription removes the listener immediately"]
pub struct Subscription {
    id: ListenerId,
    registry: Option<Weak<dyn Unsubscribe>>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("detached", &self.registry.is_none())
            .finish()
    }
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Keep the listener registered for the emitter's lifetime.
    pub fn detach(mut self) -> ListenerId {
        self.registry = None;
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.take().and_then(|weak| weak.upgrade()) {
            registry.unsubscribe(self.id);
        }
    }
}
