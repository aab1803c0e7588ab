//! Model - a record type with its own isolated table and event bus.

use std::fmt;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::ModelError;
use crate::event::{EventBus, ModelEvent};
use crate::extension::Extension;
use crate::record::{Attributes, Origin, Record};

/// Shared state behind a model: the table, the class-level bus, and the
/// installed hooks. Every record holds an `Arc` to this.
pub(crate) struct ModelState {
    pub(crate) name: String,
    pub(crate) attribute_names: Vec<String>,
    /// Insertion-ordered rows keyed by id. Re-saving an existing id
    /// keeps its position; `destroy` shifts later rows up.
    pub(crate) table: RwLock<IndexMap<String, Attributes>>,
    pub(crate) events: EventBus,
    pub(crate) extension: RwLock<Extension>,
}

/// An in-memory record type: a declared attribute list, an
/// insertion-ordered table of rows, lifecycle hooks, and a class-level
/// event bus.
///
/// `Model` is cheap to clone; clones share the same table and bus.
///
/// ## Example
///
/// ```ignore
/// use modelkit::{Model, ModelEvent};
/// use serde_json::json;
///
/// let assets = Model::setup("Asset", &["name"]);
///
/// assets.bind(ModelEvent::Create, |record, _| {
///     println!("created {}", record.id());
/// });
///
/// let asset = assets.create(json!({"name": "test.pdf"}))?;
/// assert_eq!(assets.first()?.unwrap(), asset);
/// ```
#[derive(Clone)]
pub struct Model {
    state: Arc<ModelState>,
}

impl Model {
    /// Define a new model with the given name and declared attribute
    /// list. The table and bus start empty and are isolated from every
    /// other model.
    pub fn setup(name: impl Into<String>, attribute_names: &[&str]) -> Model {
        let name = name.into();
        debug!(model = %name, attributes = ?attribute_names, "model set up");
        Model {
            state: Arc::new(ModelState {
                name,
                attribute_names: attribute_names.iter().map(|s| s.to_string()).collect(),
                table: RwLock::new(IndexMap::new()),
                events: EventBus::new(),
                extension: RwLock::new(Extension::default()),
            }),
        }
    }

    /// Merge an [`Extension`] into this model; `Some` hooks overwrite
    /// previously installed ones.
    pub fn include(&self, extension: Extension) -> Result<(), ModelError> {
        let mut installed = self
            .state
            .extension
            .write()
            .map_err(|_| ModelError::LockPoisoned("extension write"))?;
        installed.merge(extension);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.state.attribute_names
    }

    /// Construct an unsaved record from a JSON object (or `null` for an
    /// empty one) and run the init hook. The table is untouched and no
    /// id is generated.
    pub fn init(&self, attributes: Value) -> Result<Record, ModelError> {
        self.record_from_value(attributes)
    }

    /// [`init`](Model::init) followed by [`save`](Record::save): builds
    /// the record, generates an id if none was supplied, validates, and
    /// persists. Emits `create` then `save`; on validation failure emits
    /// `error` and leaves the table untouched.
    pub fn create(&self, attributes: Value) -> Result<Record, ModelError> {
        let mut record = self.init(attributes)?;
        record.save()?;
        Ok(record)
    }

    /// The canonical record for an id. This is the hard-lookup
    /// counterpart of [`exists`](Model::exists): a missing id is an
    /// error.
    pub fn find(&self, id: &str) -> Result<Record, ModelError> {
        let table = self.read_table()?;
        table
            .get(id)
            .cloned()
            .map(|row| self.materialize(id.to_string(), row))
            .ok_or_else(|| ModelError::NotFound {
                model: self.state.name.clone(),
                id: id.to_string(),
            })
    }

    /// True iff the id is present in the table.
    pub fn exists(&self, id: &str) -> Result<bool, ModelError> {
        Ok(self.read_table()?.contains_key(id))
    }

    /// All records, in insertion order.
    pub fn all(&self) -> Result<Vec<Record>, ModelError> {
        let table = self.read_table()?;
        Ok(table
            .iter()
            .map(|(id, row)| self.materialize(id.clone(), row.clone()))
            .collect())
    }

    /// First record by insertion order, if any.
    pub fn first(&self) -> Result<Option<Record>, ModelError> {
        let table = self.read_table()?;
        Ok(table
            .first()
            .map(|(id, row)| self.materialize(id.clone(), row.clone())))
    }

    /// Last record by insertion order, if any.
    pub fn last(&self) -> Result<Option<Record>, ModelError> {
        let table = self.read_table()?;
        Ok(table
            .last()
            .map(|(id, row)| self.materialize(id.clone(), row.clone())))
    }

    /// Records satisfying the predicate, in insertion order.
    pub fn select(&self, predicate: impl Fn(&Record) -> bool) -> Result<Vec<Record>, ModelError> {
        Ok(self.all()?.into_iter().filter(|r| predicate(r)).collect())
    }

    /// Invoke `f` once per record, in insertion order.
    pub fn each(&self, mut f: impl FnMut(&Record)) -> Result<(), ModelError> {
        for record in self.all()? {
            f(&record);
        }
        Ok(())
    }

    /// First record whose attribute equals the value.
    pub fn find_by_attribute(
        &self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Record>, ModelError> {
        let value = value.into();
        Ok(self
            .all()?
            .into_iter()
            .find(|record| record.get(name) == Some(&value)))
    }

    /// All records whose attribute equals the value, in insertion order.
    pub fn find_all_by_attribute(
        &self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<Record>, ModelError> {
        let value = value.into();
        self.select(|record| record.get(name) == Some(&value))
    }

    /// Current table size.
    pub fn count(&self) -> Result<usize, ModelError> {
        Ok(self.read_table()?.len())
    }

    /// Destroy every record individually, firing one `destroy` event
    /// per record.
    pub fn destroy_all(&self) -> Result<(), ModelError> {
        for record in self.all()? {
            record.destroy()?;
        }
        Ok(())
    }

    /// Wipe the table in one step. No events fire.
    pub fn delete_all(&self) -> Result<(), ModelError> {
        let mut table = self
            .state
            .table
            .write()
            .map_err(|_| ModelError::LockPoisoned("table write"))?;
        let dropped = table.len();
        table.clear();
        debug!(model = %self.state.name, dropped, "table cleared");
        Ok(())
    }

    /// Replace the whole table with the given records, without firing
    /// events. Records without an id get a generated one.
    pub fn refresh(&self, records: Vec<Record>) -> Result<(), ModelError> {
        let mut table = self
            .state
            .table
            .write()
            .map_err(|_| ModelError::LockPoisoned("table write"))?;
        table.clear();
        for record in records {
            let id = if record.id().is_empty() {
                Uuid::new_v4().to_string()
            } else {
                record.id().to_string()
            };
            table.insert(id, record.attributes.clone());
        }
        debug!(model = %self.state.name, rows = table.len(), "table refreshed");
        Ok(())
    }

    /// Parse a JSON object into one record, or a JSON array into many.
    /// Parsed records are not persisted; the init hook runs for each.
    pub fn from_json(&self, json: &str) -> Result<Vec<Record>, ModelError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| ModelError::Json(e.to_string()))?;
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.record_from_value(item))
                .collect(),
            object => Ok(vec![self.record_from_value(object)?]),
        }
    }

    /// Register a handler on the class-level bus. It observes events
    /// from every record of this model, forwarded after the record's
    /// own handlers.
    pub fn bind<F>(&self, event: ModelEvent, handler: F)
    where
        F: Fn(&Record, Option<&str>) + Send + Sync + 'static,
    {
        self.state.events.bind(event, handler);
    }

    fn record_from_value(&self, value: Value) -> Result<Record, ModelError> {
        let attributes = match value {
            Value::Object(map) => map,
            Value::Null => Attributes::new(),
            other => {
                return Err(ModelError::Json(format!(
                    "expected a JSON object of attributes, got {}",
                    other
                )))
            }
        };
        // A caller-supplied "id" names the record; it stays out of the
        // declared-attribute surface unless declared.
        let id = match attributes.get("id") {
            Some(Value::String(id)) => id.clone(),
            _ => String::new(),
        };

        let mut record = Record::new(Arc::clone(&self.state), id, attributes, Origin::Canonical);
        let hook = self
            .state
            .extension
            .read()
            .map_err(|_| ModelError::LockPoisoned("extension read"))?
            .init_hook();
        if let Some(init) = hook {
            init(&mut record);
        }
        Ok(record)
    }

    fn materialize(&self, id: String, row: Attributes) -> Record {
        Record::new(Arc::clone(&self.state), id, row, Origin::Canonical)
    }

    fn read_table(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, IndexMap<String, Attributes>>, ModelError> {
        self.state
            .table
            .read()
            .map_err(|_| ModelError::LockPoisoned("table read"))
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.state.name)
            .field("attribute_names", &self.state.attribute_names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_and_find() {
        let assets = Model::setup("Asset", &["name"]);
        let asset = assets.create(json!({"name": "test.pdf"})).unwrap();

        let found = assets.find(asset.id()).unwrap();
        assert_eq!(found, asset);
        assert_eq!(found.origin(), Origin::Canonical);
    }

    #[test]
    fn find_missing_fails() {
        let assets = Model::setup("Asset", &["name"]);
        assert!(matches!(
            assets.find("nope"),
            Err(ModelError::NotFound { .. })
        ));
    }

    #[test]
    fn exists_tracks_the_table() {
        let assets = Model::setup("Asset", &["name"]);
        let asset = assets.create(json!({"name": "test.pdf"})).unwrap();

        assert!(assets.exists(asset.id()).unwrap());
        assert!(asset.exists().unwrap());

        asset.destroy().unwrap();

        assert!(!assets.exists(asset.id()).unwrap());
        assert!(!asset.exists().unwrap());
    }

    #[test]
    fn all_follows_insertion_order() {
        let assets = Model::setup("Asset", &["name"]);
        let first = assets.create(json!({"name": "foo.pdf"})).unwrap();
        assets.create(json!({"name": "test.pdf"})).unwrap();
        let last = assets.create(json!({"name": "wem.pdf"})).unwrap();

        let all = assets.all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], first);
        assert_eq!(all[2], last);
        assert_eq!(assets.first().unwrap().unwrap(), first);
        assert_eq!(assets.last().unwrap().unwrap(), last);
    }

    #[test]
    fn resave_keeps_insertion_position() {
        let assets = Model::setup("Asset", &["name"]);
        let mut first = assets.create(json!({"name": "foo.pdf"})).unwrap();
        assets.create(json!({"name": "test.pdf"})).unwrap();

        first.set("name", "renamed.pdf");
        first.save().unwrap();

        let head = assets.first().unwrap().unwrap();
        assert_eq!(head.id(), first.id());
        assert_eq!(head.get("name"), Some(&json!("renamed.pdf")));
    }

    #[test]
    fn first_and_last_on_empty_table() {
        let assets = Model::setup("Asset", &["name"]);
        assert!(assets.first().unwrap().is_none());
        assert!(assets.last().unwrap().is_none());
    }

    #[test]
    fn select_filters_in_order() {
        let assets = Model::setup("Asset", &["name"]);
        assets.create(json!({"name": "test.pdf"})).unwrap();
        let wanted = assets.create(json!({"name": "foo.pdf"})).unwrap();

        let selected = assets
            .select(|record| record.get("name") == Some(&json!("foo.pdf")))
            .unwrap();
        assert_eq!(selected, vec![wanted]);
    }

    #[test]
    fn find_by_attribute() {
        let assets = Model::setup("Asset", &["name"]);
        let asset = assets.create(json!({"name": "foo.pdf"})).unwrap();
        assets.create(json!({"name": "test.pdf"})).unwrap();

        let one = assets.find_by_attribute("name", "foo.pdf").unwrap();
        assert_eq!(one, Some(asset.clone()));

        let many = assets.find_all_by_attribute("name", "foo.pdf").unwrap();
        assert_eq!(many, vec![asset]);

        assert_eq!(assets.find_by_attribute("name", "absent").unwrap(), None);
    }

    #[test]
    fn each_visits_every_record() {
        let assets = Model::setup("Asset", &["name"]);
        assets.create(json!({"name": "test.pdf"})).unwrap();
        assets.create(json!({"name": "foo.pdf"})).unwrap();

        let mut seen = Vec::new();
        assets
            .each(|record| seen.push(record.get("name").cloned().unwrap()))
            .unwrap();
        assert_eq!(seen, vec![json!("test.pdf"), json!("foo.pdf")]);
    }

    #[test]
    fn delete_all_clears_the_table() {
        let assets = Model::setup("Asset", &["name"]);
        assets.create(json!({"name": "foo.pdf"})).unwrap();
        assets.create(json!({"name": "foo.pdf"})).unwrap();

        assert_eq!(assets.count().unwrap(), 2);
        assets.delete_all().unwrap();
        assert_eq!(assets.count().unwrap(), 0);
    }

    #[test]
    fn destroy_all_empties_the_table() {
        let assets = Model::setup("Asset", &["name"]);
        assets.create(json!({"name": "foo.pdf"})).unwrap();
        assets.create(json!({"name": "foo.pdf"})).unwrap();

        assert_eq!(assets.count().unwrap(), 2);
        assets.destroy_all().unwrap();
        assert_eq!(assets.count().unwrap(), 0);
    }

    #[test]
    fn refresh_replaces_contents() {
        let assets = Model::setup("Asset", &["name"]);
        assets.create(json!({"name": "stale.pdf"})).unwrap();

        let parsed = assets
            .from_json(r#"[{"name":"a.pdf"},{"name":"b.pdf"}]"#)
            .unwrap();
        assets.refresh(parsed).unwrap();

        assert_eq!(assets.count().unwrap(), 2);
        let names: Vec<_> = assets
            .all()
            .unwrap()
            .iter()
            .map(|r| r.get("name").cloned().unwrap())
            .collect();
        assert_eq!(names, vec![json!("a.pdf"), json!("b.pdf")]);
    }

    #[test]
    fn from_json_object_and_array() {
        let assets = Model::setup("Asset", &["name"]);

        let one = assets.from_json(r#"{"name":"Un-Johnson me!"}"#).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].get("name"), Some(&json!("Un-Johnson me!")));

        let many = assets.from_json(r#"[{"name":"Un-Johnson me!"}]"#).unwrap();
        assert_eq!(many.len(), 1);
        assert_eq!(many[0].get("name"), Some(&json!("Un-Johnson me!")));

        // Parsing does not persist.
        assert_eq!(assets.count().unwrap(), 0);
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        let assets = Model::setup("Asset", &["name"]);
        assert!(matches!(
            assets.from_json("not json"),
            Err(ModelError::Json(_))
        ));
        assert!(matches!(
            assets.from_json(r#"[1, 2]"#),
            Err(ModelError::Json(_))
        ));
    }

    #[test]
    fn tables_are_isolated_per_model() {
        let assets = Model::setup("Asset", &["name"]);
        let users = Model::setup("User", &["name"]);

        assets.create(json!({"name": "test.pdf"})).unwrap();
        assert_eq!(assets.count().unwrap(), 1);
        assert_eq!(users.count().unwrap(), 0);
    }

    #[test]
    fn clones_share_the_table() {
        let assets = Model::setup("Asset", &["name"]);
        let handle = assets.clone();

        assets.create(json!({"name": "test.pdf"})).unwrap();
        assert_eq!(handle.count().unwrap(), 1);
    }

    #[test]
    fn caller_supplied_id_is_kept() {
        let assets = Model::setup("Asset", &["name"]);
        let asset = assets
            .create(json!({"id": "asset-1", "name": "test.pdf"}))
            .unwrap();

        assert_eq!(asset.id(), "asset-1");
        assert!(assets.exists("asset-1").unwrap());
    }
}
