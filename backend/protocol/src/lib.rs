//! # Collection protocol
//!
//! Types shared by the server, the client synchronizer and the tooling
//! crates for paginated, sortable, filterable and searchable list views.
//!
//! ## Flow
//! - A list view owns a [`QueryState`]
//! - [`encode`] turns it into query parameters, [`decode`] reverses that on the server
//! - The server derives a [`PageRequest`], runs it, and [`normalize`]s the
//!   [`RawPage`] into a [`CollectionEnvelope`]
pub mod collection;
pub mod envelope;
pub mod error;
pub mod query;
pub mod records;
pub mod state;

pub use collection::{Access, Collection, ColumnDef, ColumnKind, PRIMARY_KEY};
pub use envelope::{CollectionEnvelope, Pagination, RawPage, normalize, page_count};
pub use error::{EncodingError, ExecutionError};
pub use query::{Limits, QueryParams, decode, encode};
pub use records::{Course, Newsletter, Partner, Post, Product, Record, User};
pub use state::{
    ColumnFilters, DEFAULT_PAGE_SIZE, FilterValue, PageRequest, QueryState, SortDirection,
    SortSpec, normalize_search,
};
