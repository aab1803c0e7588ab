use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Validation hook rejected the record. Paired with an `error` event.
    Validation { message: String },
    /// Hard lookup failure from `find`/`reload`.
    NotFound { model: String, id: String },
    /// Malformed JSON input, or a non-object payload where an object is required.
    Json(String),
    /// Poisoned interior lock.
    LockPoisoned(&'static str),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Validation { message } => {
                write!(f, "validation failed: {}", message)
            }
            ModelError::NotFound { model, id } => {
                write!(f, "record not found: {}:{}", model, id)
            }
            ModelError::Json(msg) => write!(f, "json error: {}", msg),
            ModelError::LockPoisoned(operation) => {
                write!(f, "model lock poisoned during {}", operation)
            }
        }
    }
}

impl std::error::Error for ModelError {}
