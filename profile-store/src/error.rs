use std::path::PathBuf;

use miette::Diagnostic;
use profile_schema::ValidationErrors;
use thiserror::Error;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Error, Debug, Diagnostic)]
pub enum StoreError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("no profile with id '{0}'")]
    #[diagnostic(code(store::not_found))]
    NotFound(String),

    #[error("rejected import: {0}")]
    #[diagnostic(
        code(store::import_format),
        help("expected a snapshot of the form {{\"version\": \"1.0\", \"profiles\": [...]}}")
    )]
    ImportFormat(String),

    #[error("stored profile '{id}' in {path} is invalid")]
    #[diagnostic(code(store::corrupt))]
    CorruptProfile {
        id: String,
        path: PathBuf,
        #[source]
        source: ValidationErrors,
    },

    #[error("patch for profile '{id}' does not fit the profile document: {source}")]
    #[diagnostic(code(store::patch))]
    Patch {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
