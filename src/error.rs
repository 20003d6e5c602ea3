//! Error types for the table engine

use thiserror::Error;

use crate::data_type::DataType;

pub type Result<T> = std::result::Result<T, TableError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Table is already prepared")]
    AlreadyPrepared,

    #[error("Table is not prepared")]
    NotPrepared,

    #[error("Table has no columns")]
    NoColumns,

    #[error("Column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Column index {index} out of range ({count} columns)")]
    ColumnOutOfRange { index: usize, count: usize },

    #[error("Type mismatch: column expects {expected:?}, value is {found:?}")]
    TypeMismatch {
        expected: DataType,
        found: Option<DataType>,
    },

    #[error("Value of {size} bytes exceeds column capacity of {max_size} bytes")]
    ValueTooLarge { size: usize, max_size: usize },

    #[error("Cannot convert {from:?} to {to:?}")]
    Conversion { from: Option<DataType>, to: DataType },

    #[error("Null tracking is not enabled for this table")]
    NullsNotTracked,

    #[error("Row status tracking is not enabled for this table")]
    RowStatusNotTracked,

    #[error("{count} columns exceed the {width}-bit null bitmap")]
    TooManyColumns { count: usize, width: usize },

    #[error("Row has {found} values, table has {expected} columns")]
    ColumnCountMismatch { expected: usize, found: usize },

    #[error("Column spec error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Invalid wildcard pattern: {0}")]
    Pattern(String),

    #[error("Invalid options: {0}")]
    Options(String),
}

impl From<glob::PatternError> for TableError {
    fn from(err: glob::PatternError) -> Self {
        TableError::Pattern(err.to_string())
    }
}

impl From<serde_json::Error> for TableError {
    fn from(err: serde_json::Error) -> Self {
        TableError::Options(err.to_string())
    }
}
