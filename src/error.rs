use thiserror::Error;

use crate::diagnostic::Diagnostic;

/// Fatal code generation errors.
///
/// These signal model-definition or configuration bugs rather than mistakes
/// in user snippets; snippet mistakes are reported as [`Diagnostic`]s.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Undefined identifier '{0}'")]
    UndefinedIdentifier(String),

    #[error("no resolved type for {0}; snippet was not type checked")]
    Untyped(String),

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("Redeclaration of '{0}'")]
    Redeclaration(String),

    #[error("struct field '{name}' registered with conflicting types '{existing}' and '{requested}'")]
    FieldConflict {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("no memory space has room for {bytes} bytes of merged struct '{name}'")]
    NoMemorySpace { name: String, bytes: usize },

    #[error("merged group {group} is inconsistent: {message}")]
    InconsistentGroup { group: String, message: String },

    #[error("row {row} is full ({stride} synapses)")]
    RowFull { row: usize, stride: usize },

    #[error("{context}: compilation failed with {} error(s)", .diagnostics.len())]
    Compile {
        context: String,
        diagnostics: Vec<Diagnostic>,
        /// Diagnostics rendered against the snippet source.
        report: String,
    },

    #[error("configuration error in {path}: {message}")]
    Config { path: String, message: String },

    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
