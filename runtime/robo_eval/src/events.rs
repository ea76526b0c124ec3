//! Script lifecycle notifications.
//!
//! Every `Script::process` call emits exactly one [`LifecycleKind::Started`]
//! and one [`LifecycleKind::Finished`] event, sharing a [`RunId`]. Listeners
//! are registered on an [`EventHost`], which may be cloned and shared with
//! other threads (an IDE, a pool manager).

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use robo_ir::{RunId, ScriptId};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LifecycleKind {
    Started,
    Finished,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub kind: LifecycleKind,
    pub script: ScriptId,
    pub run: RunId,
}

pub type Listener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Registry of lifecycle listeners.
#[derive(Clone, Default)]
pub struct EventHost(Arc<RwLock<Vec<Listener>>>);

impl EventHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.0.write().push(Arc::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.0.read().len()
    }

    /// Invoke every listener. The lock is released before listeners run, so a
    /// listener may subscribe others.
    pub fn emit(&self, event: &LifecycleEvent) {
        let listeners: Vec<Listener> = self.0.read().clone();
        for listener in &listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for EventHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHost")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
