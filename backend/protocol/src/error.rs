use std::time::Duration;

use thiserror::Error;

/// A query state that cannot be put on (or taken off) the wire.
///
/// Raised before any request leaves the client, and by the server when a
/// query string fails to decode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("page size must be at least 1")]
    InvalidPageSize,

    #[error("page size {requested} exceeds the maximum of {max}")]
    PageSizeTooLarge { requested: u32, max: u32 },

    #[error("page must be at least 1")]
    InvalidPage,

    #[error("invalid value for `{param}`: {value}")]
    InvalidNumber { param: String, value: String },

    #[error("invalid sort column `{0}`")]
    InvalidSortColumn(String),

    #[error("invalid sort direction `{0}`")]
    InvalidSortDirection(String),

    #[error("sort lists {columns} columns but {directions} directions")]
    SortLengthMismatch { columns: usize, directions: usize },

    #[error("unknown filter column `{0}`")]
    UnknownFilterColumn(String),

    #[error("invalid filter value for `{column}`: {reason}")]
    InvalidFilterValue { column: String, reason: String },
}

/// Failure of the datastore behind a collection query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("datastore unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("executor returned {rows} rows for a page of {page_size}")]
    RowOverflow { rows: usize, page_size: u32 },
}
