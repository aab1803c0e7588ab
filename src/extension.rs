//! Extension - optional lifecycle hooks merged into a model.
//!
//! Replaces runtime mixin patching with explicit composition: a model
//! holds one `Extension`, and [`Model::include`](crate::Model::include)
//! merges another into it, `Some` fields overwriting.

use std::sync::Arc;

use crate::record::Record;

type ValidateHook = Arc<dyn Fn(&Record) -> Option<String> + Send + Sync>;
type InitHook = Arc<dyn Fn(&mut Record) + Send + Sync>;

/// Optional hooks a model may carry.
///
/// ## Example
///
/// ```ignore
/// asset.include(Extension::new().validate(|record| {
///     match record.get("name") {
///         Some(name) if !name.as_str().unwrap_or("").is_empty() => None,
///         _ => Some("Name required".to_string()),
///     }
/// }));
/// ```
#[derive(Default, Clone)]
pub struct Extension {
    validate: Option<ValidateHook>,
    init: Option<InitHook>,
}

impl Extension {
    pub fn new() -> Self {
        Extension::default()
    }

    /// Set the validation hook. Returning `Some(message)` rejects the
    /// record; `None` accepts it.
    pub fn validate<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Record) -> Option<String> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(hook));
        self
    }

    /// Set the init hook, run after attributes are loaded into a fresh
    /// record (including records parsed by `from_json`).
    pub fn init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Record) + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(hook));
        self
    }

    pub(crate) fn merge(&mut self, other: Extension) {
        if other.validate.is_some() {
            self.validate = other.validate;
        }
        if other.init.is_some() {
            self.init = other.init;
        }
    }

    pub(crate) fn validate_hook(&self) -> Option<ValidateHook> {
        self.validate.clone()
    }

    pub(crate) fn init_hook(&self) -> Option<InitHook> {
        self.init.clone()
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("validate", &self.validate.is_some())
            .field("init", &self.init.is_some())
            .finish()
    }
}
