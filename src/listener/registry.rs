//! Listener registry with explicit subscription handles

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

/// Handle returned when a listener is registered.
///
/// Dropping the handle does NOT unregister the listener: the registry keeps
/// the listener alive until [`ListenerRegistry::unsubscribe`] is called with
/// this handle. A handle that is never disposed leaks its listener.
#[must_use = "a listener stays registered until its subscription is passed to unsubscribe"]
pub struct Subscription<L: ?Sized> {
    id: Uuid,
    _listener: PhantomData<fn() -> Box<L>>,
}

impl<L: ?Sized> Subscription<L> {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl<L: ?Sized> fmt::Debug for Subscription<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Registered listeners of one kind.
pub struct ListenerRegistry<L: ?Sized> {
    listeners: RwLock<HashMap<Uuid, Arc<L>>>,
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }
}

impl<L: ?Sized> ListenerRegistry<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<L>) -> Subscription<L> {
        let id = Uuid::new_v4();
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, listener);
        Subscription {
            id,
            _listener: PhantomData,
        }
    }

    /// Dispose a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, subscription: Subscription<L>) -> bool {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&subscription.id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call `f` on a point-in-time copy of the listeners. The registry lock
    /// is not held while listeners run, so a listener may unsubscribe itself.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&L),
    {
        let snapshot: Vec<Arc<L>> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        for listener in &snapshot {
            f(listener.as_ref());
        }
    }
}
