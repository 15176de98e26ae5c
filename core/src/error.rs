use thiserror::Error;

/// Error type for logbook imports.
#[derive(Error, Debug, uniffi::Error)]
#[uniffi(flat_error)]
pub enum ImportError {
    #[error("query engine error: {0}")]
    Engine(String),

    #[error("database query {query} failed: {message}")]
    Query { query: &'static str, message: String },

    #[error("cannot open logbook '{url}': {message}")]
    Open { url: String, message: String },

    #[error("import of '{url}' failed: {source}")]
    Logbook {
        url: String,
        #[source]
        source: Box<ImportError>,
    },
}

impl ImportError {
    /// Attribute a raw engine failure to the named query. Errors raised by
    /// nested queries already carry their own name and pass through.
    pub fn in_query(self, query: &'static str) -> Self {
        match self {
            ImportError::Engine(message) => ImportError::Query { query, message },
            other => other,
        }
    }

    /// Name of the query that failed, if any.
    pub fn query(&self) -> Option<&'static str> {
        match self {
            ImportError::Query { query, .. } => Some(query),
            ImportError::Logbook { source, .. } => source.query(),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Engine(err.to_string())
    }
}
