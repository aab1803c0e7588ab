//! Event bus - synchronous lifecycle event dispatch.
//!
//! Every model carries one bus, and every record carries its own. Handlers
//! run synchronously, in registration order, on the thread that performed
//! the operation. Instance-originated `save`/`update`/`destroy`/`error`
//! events fire on the record's bus first and are then forwarded to the
//! model's bus with the same arguments, so callers can observe a single
//! record or the whole model.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::record::Record;

/// Lifecycle events emitted by models and records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    Create,
    Update,
    Save,
    Destroy,
    Error,
}

impl ModelEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelEvent::Create => "create",
            ModelEvent::Update => "update",
            ModelEvent::Save => "save",
            ModelEvent::Destroy => "destroy",
            ModelEvent::Error => "error",
        }
    }
}

impl std::fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler signature for all events. The message is `Some` only for
/// [`ModelEvent::Error`], where it carries the validation message.
type Handler = Arc<dyn Fn(&Record, Option<&str>) + Send + Sync>;

/// Synchronous publish/subscribe register.
///
/// ## Example
///
/// ```ignore
/// let asset = Model::setup("Asset", &["name"]);
///
/// asset.bind(ModelEvent::Create, |record, _| {
///     println!("created {}", record.id());
/// });
///
/// asset.create(json!({"name": "test.pdf"}))?;
/// ```
pub struct EventBus {
    handlers: RwLock<HashMap<ModelEvent, Vec<Handler>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler for an event on this bus.
    ///
    /// The handlers lock is held only while pushing the handler, never
    /// while handlers run, so a handler panic cannot poison it. A
    /// poisoned lock is therefore unreachable in practice and is
    /// swallowed here rather than making every `bind` fallible.
    pub fn bind<F>(&self, event: ModelEvent, handler: F)
    where
        F: Fn(&Record, Option<&str>) + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.handlers.write() {
            handlers.entry(event).or_default().push(Arc::new(handler));
        }
    }

    /// Invoke all handlers for an event, in registration order.
    ///
    /// Handlers run outside the lock, so a handler may bind further
    /// handlers or call back into the model. Panics in handlers
    /// propagate to the caller.
    ///
    /// Like [`bind`](EventBus::bind), a poisoned handlers lock is
    /// unreachable in practice and dispatch is skipped rather than
    /// failing a mutation that has already been applied.
    pub(crate) fn trigger(&self, event: ModelEvent, record: &Record, message: Option<&str>) {
        let handlers: Vec<Handler> = match self.handlers.read() {
            Ok(map) => match map.get(&event) {
                Some(list) => list.clone(),
                None => return,
            },
            Err(_) => return,
        };

        for handler in handlers {
            handler(record, message);
        }
    }
}
