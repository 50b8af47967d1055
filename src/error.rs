use thiserror::Error;

/// Structural failures in the save-text grammar. These abort the run: no
/// downstream stage can work without a parsed model.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected '}}' at line {line}, column {column}")]
    UnbalancedClose { line: u32, column: u32 },

    #[error("unexpected end of input with {depth} unclosed '{{'")]
    UnexpectedEof { depth: usize },

    #[error("unterminated string opened at line {line}, column {column}")]
    UnterminatedString { line: u32, column: u32 },

    #[error("missing value for key '{key}' at line {line}, column {column}")]
    MissingValue { key: String, line: u32, column: u32 },

    #[error("stray '=' at line {line}, column {column}")]
    StrayOperator { line: u32, column: u32 },
}

/// Type mismatches while mapping the parsed clause table onto typed
/// entities. Carries the offending key path.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("expected {expected} at '{path}'")]
    TypeMismatch {
        path: String,
        expected: &'static str,
    },

    #[error("missing required field '{path}'")]
    MissingField { path: String },

    #[error("entity id '{raw}' at '{path}' is not an integer")]
    BadEntityId { path: String, raw: String },
}
