//! modelkit - a synchronous in-memory record/model layer.
//!
//! Schema-lite records with CRUD, validation hooks, JSON
//! (de)serialization, explicit copy semantics, and a two-level
//! synchronous event bus (per record and per model) for lifecycle
//! notifications. Meant to back a view layer that subscribes to events
//! and renders from [`Record::attributes`]; there is no persistence and
//! no network surface.
//!
//! ## Example
//!
//! ```
//! use modelkit::{Extension, Model, ModelError, ModelEvent};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), ModelError> {
//! let assets = Model::setup("Asset", &["name"]);
//!
//! assets.include(Extension::new().validate(|record| {
//!     match record.get("name").and_then(|v| v.as_str()) {
//!         Some(name) if !name.is_empty() => None,
//!         _ => Some("Name required".to_string()),
//!     }
//! }))?;
//!
//! assets.bind(ModelEvent::Save, |record, _| {
//!     println!("saved {}", record.id());
//! });
//!
//! let mut asset = assets.create(json!({"name": "test.pdf"}))?;
//! asset.set("name", "wem.pdf");
//! asset.save()?;
//!
//! assert_eq!(assets.first()?.unwrap().get("name"), Some(&json!("wem.pdf")));
//! assert!(assets.create(json!({"name": ""})).is_err());
//! # Ok(())
//! # }
//! ```

mod error;
mod event;
mod extension;
mod model;
mod record;

pub use error::ModelError;
pub use event::{EventBus, ModelEvent};
pub use extension::Extension;
pub use model::Model;
pub use record::{Attributes, Origin, Record};
