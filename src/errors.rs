use thiserror::Error;

/// Every failure the parsing session can produce. All of these are ordinary
/// returned values; nothing here aborts the process.
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    /// A filter declared with the `:required` tag was absent from the input.
    #[error("required")]
    Required,

    /// Value does not parse as the declared type, or a key/value pair is
    /// structurally malformed (e.g. `name[` with no closing bracket).
    #[error("bad format")]
    BadFormat,

    /// A value was missing where one is required.
    #[error("empty value")]
    EmptyValue,

    /// Bracketed method not in the fixed method table.
    #[error("unknown method")]
    UnknownMethod,

    /// Method exists but is illegal for this field type / arity combination.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// A validator rejected the value it was given.
    #[error("{0}: not in scope")]
    NotInScope(String),

    /// Filter name known but rejected by policy.
    #[error("filter not allowed")]
    FilterNotAllowed,

    /// Filter name unknown and the session does not ignore unknown names.
    #[error("filter not found")]
    FilterNotFound,

    /// A system-reserved name (`fields`, `sort`) was used without an
    /// explicit validator.
    #[error("validation not found")]
    ValidationNotFound,

    /// Free-form message from a user-supplied validator.
    #[error("{0}")]
    Validation(String),

    /// Wrapper attaching the offending key to an underlying failure.
    #[error("{key}: {source}")]
    Key {
        key: String,
        #[source]
        source: Box<QueryError>,
    },
}

impl QueryError {
    /// Wrap this error with the query key it was triggered by.
    pub fn with_key(self, key: &str) -> Self {
        Self::Key {
            key: key.to_string(),
            source: Box::new(self),
        }
    }

    /// The underlying kind, unwrapping any `Key` context layers.
    pub fn root(&self) -> &QueryError {
        match self {
            Self::Key { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
