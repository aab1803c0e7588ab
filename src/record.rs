//! Record - a single model instance and its lifecycle operations.

use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::ModelError;
use crate::event::{EventBus, ModelEvent};
use crate::model::ModelState;

/// Attribute storage for a record: attribute name to JSON value.
pub type Attributes = serde_json::Map<String, Value>;

/// How a record came to be, replacing prototype-chain identity with an
/// explicit tag.
///
/// The table only ever stores rows materialized back as `Canonical`
/// records. `Duplicate` copies are type-identical (`dup`, and the
/// pre-reload snapshot returned by `reload`); `Clone` copies are
/// subtype-tagged (`clone_record`, and every record delivered to
/// `create`/`update` handlers), useful for telling uncommitted working
/// copies apart from canonical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Canonical,
    Duplicate,
    Clone,
}

/// A single record: an identifier plus attribute values, bound to the
/// model it belongs to and carrying its own event bus.
///
/// Records are value snapshots. A record held across a table mutation
/// goes stale until [`reload`](Record::reload) re-fetches the canonical
/// row.
///
/// ## Example
///
/// ```ignore
/// let mut asset = assets.create(json!({"name": "test.pdf"}))?;
/// asset.set("name", "wem.pdf");
/// asset.save()?;
/// ```
pub struct Record {
    id: String,
    pub(crate) attributes: Attributes,
    origin: Origin,
    state: Arc<ModelState>,
    events: Arc<EventBus>,
}

impl Record {
    pub(crate) fn new(
        state: Arc<ModelState>,
        id: String,
        attributes: Attributes,
        origin: Origin,
    ) -> Self {
        Record {
            id,
            attributes,
            origin,
            state,
            events: Arc::new(EventBus::new()),
        }
    }

    /// The record's identifier. Empty until the first save when no id
    /// was supplied at construction.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Name of the model this record belongs to.
    pub fn model_name(&self) -> &str {
        &self.state.name
    }

    /// Current value of an attribute, declared or not.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Set an attribute value. Takes effect in the table on the next
    /// [`save`](Record::save).
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// The declared attributes and their current values, in declaration
    /// order. Undeclared keys (including a non-declared `id`) are
    /// excluded; declared names with no value yet are omitted.
    pub fn attributes(&self) -> Attributes {
        let mut out = Attributes::new();
        for name in &self.state.attribute_names {
            if let Some(value) = self.attributes.get(name) {
                out.insert(name.clone(), value.clone());
            }
        }
        out
    }

    /// Register a handler on this record's own bus. Instance events are
    /// forwarded to the model bus after the instance handlers ran.
    pub fn bind<F>(&self, event: ModelEvent, handler: F)
    where
        F: Fn(&Record, Option<&str>) + Send + Sync + 'static,
    {
        self.events.bind(event, handler);
    }

    /// Runs the model's validation hook. True when the hook is absent
    /// or returns no message.
    pub fn is_valid(&self) -> bool {
        matches!(self.validation_message(), Ok(None))
    }

    /// Validate and persist this record into the model's table.
    ///
    /// On validation failure emits `error` (instance then model) and
    /// returns [`ModelError::Validation`] without touching the table.
    /// On success, assigns a generated id if none is set, upserts the
    /// row, then emits `update` when the id already existed or `create`
    /// when it did not, followed by `save` in either case.
    pub fn save(&mut self) -> Result<(), ModelError> {
        if let Some(message) = self.validation_message()? {
            self.emit(ModelEvent::Error, self, Some(&message));
            return Err(ModelError::Validation { message });
        }

        if self.id.is_empty() {
            self.id = Uuid::new_v4().to_string();
        }

        let existed = {
            let mut table = self
                .state
                .table
                .write()
                .map_err(|_| ModelError::LockPoisoned("table write"))?;
            table
                .insert(self.id.clone(), self.attributes.clone())
                .is_some()
        };
        debug!(model = %self.state.name, id = %self.id, existed, "record saved");

        let snapshot = self.event_snapshot();
        if existed {
            self.emit(ModelEvent::Update, &snapshot, None);
        } else {
            self.emit(ModelEvent::Create, &snapshot, None);
        }
        self.emit(ModelEvent::Save, self, None);
        Ok(())
    }

    /// Merge partial attributes (a JSON object) into this record, then
    /// [`save`](Record::save).
    ///
    /// A record's identity is fixed at construction: an `"id"` key here
    /// merges as an ordinary attribute and never rekeys the table row.
    pub fn update_attributes(&mut self, attributes: Value) -> Result<(), ModelError> {
        match attributes {
            Value::Object(map) => {
                for (name, value) in map {
                    self.attributes.insert(name, value);
                }
            }
            Value::Null => {}
            other => {
                return Err(ModelError::Json(format!(
                    "expected a JSON object of attributes, got {}",
                    other
                )))
            }
        }
        self.save()
    }

    /// Remove this record from the table and emit `destroy` (instance
    /// then model). The record value stays with the caller, detached:
    /// [`exists`](Record::exists) is false afterwards.
    pub fn destroy(&self) -> Result<(), ModelError> {
        {
            let mut table = self
                .state
                .table
                .write()
                .map_err(|_| ModelError::LockPoisoned("table write"))?;
            table.shift_remove(&self.id);
        }
        debug!(model = %self.state.name, id = %self.id, "record destroyed");
        self.emit(ModelEvent::Destroy, self, None);
        Ok(())
    }

    /// Overwrite this record's attributes from the canonical table row,
    /// returning the pre-reload state as a directly-typed
    /// (`Origin::Duplicate`, not `Clone`) snapshot.
    pub fn reload(&mut self) -> Result<Record, ModelError> {
        let row = {
            let table = self
                .state
                .table
                .read()
                .map_err(|_| ModelError::LockPoisoned("table read"))?;
            table.get(&self.id).cloned()
        }
        .ok_or_else(|| ModelError::NotFound {
            model: self.state.name.clone(),
            id: self.id.clone(),
        })?;

        let previous = std::mem::replace(&mut self.attributes, row);
        Ok(Record::new(
            Arc::clone(&self.state),
            self.id.clone(),
            previous,
            Origin::Duplicate,
        ))
    }

    /// A type-identical (`Origin::Duplicate`) copy with its own bus,
    /// decoupled from future mutation of either side.
    pub fn dup(&self) -> Record {
        Record::new(
            Arc::clone(&self.state),
            self.id.clone(),
            self.attributes.clone(),
            Origin::Duplicate,
        )
    }

    /// A subtype-tagged (`Origin::Clone`) copy with its own bus, also
    /// decoupled.
    pub fn clone_record(&self) -> Record {
        Record::new(
            Arc::clone(&self.state),
            self.id.clone(),
            self.attributes.clone(),
            Origin::Clone,
        )
    }

    /// True iff this record's id is present in the table. A live
    /// reference to a destroyed record does not exist.
    pub fn exists(&self) -> Result<bool, ModelError> {
        let table = self
            .state
            .table
            .read()
            .map_err(|_| ModelError::LockPoisoned("table read"))?;
        Ok(table.contains_key(&self.id))
    }

    /// Serialize the declared attributes (only) as a JSON object.
    pub fn to_json(&self) -> Result<String, ModelError> {
        serde_json::to_string(self).map_err(|e| ModelError::Json(e.to_string()))
    }

    fn validation_message(&self) -> Result<Option<String>, ModelError> {
        let hook = self
            .state
            .extension
            .read()
            .map_err(|_| ModelError::LockPoisoned("extension read"))?
            .validate_hook();
        // Invoked outside the lock so the hook may touch the model.
        Ok(hook.and_then(|validate| validate(self)))
    }

    /// Fire on the instance bus first, then forward to the model bus
    /// with the same arguments.
    fn emit(&self, event: ModelEvent, record: &Record, message: Option<&str>) {
        self.events.trigger(event, record, message);
        self.state.events.trigger(event, record, message);
    }

    /// Snapshot delivered to `create`/`update` handlers: a `Clone`-tagged
    /// copy, never the stored row, so handlers cannot alias the table.
    fn event_snapshot(&self) -> Record {
        self.clone_record()
    }
}

impl Clone for Record {
    fn clone(&self) -> Self {
        Record {
            id: self.id.clone(),
            attributes: self.attributes.clone(),
            origin: self.origin,
            state: Arc::clone(&self.state),
            events: Arc::clone(&self.events),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.state.name)
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// Records compare equal by id and declared attributes, so a copy (of
/// any origin) compares equal to its source until one diverges.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.attributes() == other.attributes()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let attributes = self.attributes();
        let mut map = serializer.serialize_map(Some(attributes.len()))?;
        for (name, value) in &attributes {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
