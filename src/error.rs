use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving runtime parameters or decomposing the domain.
#[derive(Error, Debug)]
pub enum MomError {
    #[error("The variable {0} is not a CIME xml variable for this case")]
    UndefinedCaseVariable(String),

    #[error("Malformed case variable reference in entry: {0}")]
    MalformedReference(String),

    #[error(
        "The entry {0} has an expandable case variable! expand_case_vars must be called \
         before infer_values is called"
    )]
    UnexpandedVariable(String),

    #[error("Not all members of the entry {0} are conditional")]
    MixedGuardBlock(String),

    #[error("Guard is not boolean: {guard} evaluates to {value}")]
    NonBooleanGuard { guard: String, value: String },

    #[error("The following formula may be comparing different types of variables: {0}")]
    TypeConfusion(String),

    #[error("Cannot evaluate formula: {formula} ({reason})")]
    InvalidFormula { formula: String, reason: String },

    #[error("Cannot apply the guards. No data found.")]
    EmptyDocument,

    #[error("Cannot infer input format of {0}")]
    UnknownFormat(PathBuf),

    #[error(
        "Couldn't auto-eliminate any land blocks for {npes} PEs. Try to increase the number \
         of PEs or the halo allowance"
    )]
    Unsatisfiable { npes: usize },

    #[error("Invalid domain extents: {0}")]
    InvalidExtent(String),

    #[error("Invalid processor layout: {0}")]
    InvalidLayout(String),

    #[error("Invalid land mask: {0}")]
    InvalidMask(String),

    #[error("Field \"{field}\" is listed more than once in file: {file}")]
    DuplicateDiagField { field: String, file: String },

    #[error("Invalid diag_table: {0}")]
    InvalidDiagTable(String),

    #[error("{source_name}:{line}: {reason}")]
    ParamSyntax {
        source_name: String,
        line: usize,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Settings(#[from] config::ConfigError),
}

/// Convenience type for `Result<T, MomError>`.
pub type MomResult<T> = Result<T, MomError>;
