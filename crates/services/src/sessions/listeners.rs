use std::sync::{Arc, Mutex, Weak};

use quiz_core::model::{SubjectId, TickOutcome};

/// What changed in the controller. Delivered after the change is applied
/// and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started(SubjectId),
    Restored(SubjectId),
    AnswerSelected { question: usize, option: usize },
    Navigated { question: usize },
    Ticked(TickOutcome),
    Completed { score: u32 },
    Cleared(SubjectId),
    PlayerChanged,
    SignedOut,
}

type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Listener registry with synchronous fan-out in registration order.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Registry>>,
}

/// Handle returned by [`ListenerRegistry::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Deregister the listener. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let Ok(mut guard) = registry.lock() else {
            return false;
        };
        let before = guard.listeners.len();
        guard.listeners.retain(|(id, _)| *id != self.id);
        guard.listeners.len() != before
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = match self.inner.lock() {
            Ok(mut guard) => {
                guard.next_id += 1;
                let id = guard.next_id;
                guard.listeners.push((id, Arc::new(listener)));
                id
            }
            Err(_) => 0,
        };
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map_or(0, |g| g.listeners.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every listener in registration order.
    ///
    /// The listener list is copied first, so a listener may subscribe or
    /// unsubscribe from inside its callback.
    pub fn notify(&self, event: &SessionEvent) {
        let listeners: Vec<Listener> = match self.inner.lock() {
            Ok(guard) => guard.listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(event);
        }
    }
}
