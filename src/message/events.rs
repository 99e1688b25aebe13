//! Notifications raised by a message when properties change or it is sent.

use serde::Serialize;

/// A notification raised by an [`ExternMessage`](super::ExternMessage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MessageEvent {
    /// A new property key was added.
    PropertyAdded {
        name: String,
        value: Option<String>,
    },
    /// An existing property's value changed.
    PropertyChanged {
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
    /// The message was written to the store.
    Sent { id: String },
}

type Listener = Box<dyn Fn(&MessageEvent) + Send + Sync>;

/// Registered listeners for one message. Invocation order is unspecified.
#[derive(Default)]
pub struct Listeners {
    listeners: Vec<Listener>,
}

impl Listeners {
    pub fn subscribe(&mut self, listener: impl Fn(&MessageEvent) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub(crate) fn emit(&self, event: MessageEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}
