use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to parse JSON in {file}: {source}")]
    InvalidJson {
        file: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source path does not exist: {0}")]
    NotFound(String),
    #[error("Failed to list sources under {path}: {message}")]
    ListFailed { path: String, message: String },
    #[error("Source {path} is outside {root}")]
    OutsideRoot { path: String, root: String },
    #[error("Failed to read source {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to open document store: {0}")]
    ConnectionFailed(String),
    #[error("Failed to read document {path}: {message}")]
    ReadFailed { path: String, message: String },
    #[error("Failed to write document {path}: {message}")]
    WriteFailed { path: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::ConnectionFailed(e.to_string())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {message}")]
    SettingsUnreadable { path: String, message: String },
    #[error("Invalid settings file '{path}': {message}")]
    SettingsInvalid { path: String, message: String },
    #[error("Invalid sort mode: '{0}'. Expected 'page' or 'time'")]
    InvalidSortMode(String),
}

/// Anything that stops a single source from being imported.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
