use thiserror::Error;

/// Failure kinds for the external config store.
///
/// Callers decide degrade-vs-surface per kind: the resolver collapses both
/// variants into "use process defaults", while the configure persist path
/// logs `Transient` failures for operators.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no record stored for key `{0}`")]
    NotFound(String),
    #[error("transient store failure: {0}")]
    Transient(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Short classification tag for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Transient(_) => "transient",
        }
    }
}
