use thiserror::Error;

/// Errors raised by the bookmark tree model.
///
/// Every operation that returns one of these leaves the forest exactly as it
/// was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot move '{node}' into '{target}': target is the node itself or one of its descendants")]
    CycleViolation { node: String, target: String },

    #[error("changes could not be saved: {0}")]
    Persistence(String),

    #[error("could not generate a unique id after {attempts} attempts")]
    IdCollisionExhausted { attempts: u32 },
}

impl TreeError {
    pub fn not_found(what: impl Into<String>) -> Self {
        TreeError::NotFound(what.into())
    }

    pub fn invalid(what: impl Into<String>) -> Self {
        TreeError::InvalidInput(what.into())
    }
}

pub type TreeResult<T> = std::result::Result<T, TreeError>;
