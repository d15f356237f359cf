//! # Client
//!
//! Client logic for list views of the dashboard.
//!
//! ## Pieces
//! - [`CollectionSource`]: anything that answers an encoded listing request
//! - [`HttpSource`]: the server over HTTP, with an optional bearer token
//! - [`Synchronizer`]: owns the state of one list view
//!
//!
//!
//! ## Flow
//!
//! - View creates a synchronizer and calls `refetch` for the first page
//! - Paging, sorting and filter changes go through the setters
//! - Search input goes through `set_search_value` and is debounced (300 ms by default)
//! - After deleting or editing a row elsewhere, the view calls `refetch`
//! - The view renders whatever `subscribe` or `snapshot` reports: rows,
//!   loading flag, error banner
//!
//!
//!
//! ## Errors
//!
//! - 401/403 become [`FetchError::Authorization`], so the view can ask for a sign in
//! - Everything else, timeouts included, is [`FetchError::Execution`]
//! - A state the encoder rejects never leaves the client: the setter or `refetch`
//!   returns the error, and a zero page size is refused by `Synchronizer::new`
pub mod config;
pub mod error;
pub mod source;
pub mod sync;

pub use config::SyncConfig;
pub use error::{ConfigError, FetchError};
pub use source::{CollectionSource, HttpSource};
pub use sync::{Phase, Resolution, Synchronizer, ViewState};
