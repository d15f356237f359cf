//! # Query strings
//!
//! Canonical transport form of a [`QueryState`].
//!
//! ## Parameters
//! - `page`: 1-based page number (`pageIndex + 1`)
//! - `limit`: page size, `pageSize` is accepted as an alias when decoding
//! - `search`: omitted when empty
//! - `sort` / `sortDir`: parallel comma-separated lists, omitted when unsorted
//! - `filter_<columnId>`: one per active column filter, in column id order
//!
//! Encoding is a pure function of the state, so identical states always
//! produce identical parameter lists and transports can cache or de-duplicate
//! on them. Sort columns are passed through as given and validated by the
//! server; filter columns are checked against the collection catalog here.
use serde::{Deserialize, Serialize};

use crate::{
    collection::{Collection, ColumnDef, ColumnKind},
    error::EncodingError,
    state::{ColumnFilters, DEFAULT_PAGE_SIZE, FilterValue, QueryState, SortDirection, SortSpec},
};

pub const PAGE: &str = "page";
pub const LIMIT: &str = "limit";
pub const PAGE_SIZE: &str = "pageSize";
pub const SEARCH: &str = "search";
pub const SORT: &str = "sort";
pub const SORT_DIR: &str = "sortDir";
pub const FILTER_PREFIX: &str = "filter_";

const LIST_SEPARATOR: char = ',';

/// Ordered `name=value` pairs ready for a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }
}

impl From<Vec<(String, String)>> for QueryParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Page size bounds applied while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: 100,
        }
    }
}

pub fn encode(state: &QueryState, collection: Collection) -> Result<QueryParams, EncodingError> {
    if state.page_size == 0 {
        return Err(EncodingError::InvalidPageSize);
    }

    let mut params = QueryParams::default();
    params.push(PAGE, (u64::from(state.page_index) + 1).to_string());
    params.push(LIMIT, state.page_size.to_string());

    if !state.search_value.is_empty() {
        params.push(SEARCH, state.search_value.as_str());
    }

    if !state.sort.is_empty() {
        for spec in &state.sort {
            check_sort_column(&spec.column_id)?;
        }

        params.push(SORT, join(state.sort.iter().map(|spec| spec.column_id.as_str())));
        params.push(SORT_DIR, join(state.sort.iter().map(|spec| spec.direction.as_str())));
    }

    for (column_id, value) in &state.column_filters {
        let column = filter_column(collection, column_id)?;
        check_filter_value(column, value)?;

        params.push(format!("{FILTER_PREFIX}{column_id}"), encode_filter_value(value));
    }

    Ok(params)
}

pub fn decode(
    params: &QueryParams,
    collection: Collection,
    limits: Limits,
) -> Result<QueryState, EncodingError> {
    let mut page: Option<u64> = None;
    let mut page_size: Option<u32> = None;
    let mut search_value = String::new();
    let mut sort_columns: Option<&str> = None;
    let mut sort_directions: Option<&str> = None;
    let mut column_filters = ColumnFilters::new();

    for (key, value) in params.pairs() {
        match key.as_str() {
            PAGE => page = Some(parse_number(PAGE, value)?),
            LIMIT | PAGE_SIZE => page_size = Some(parse_number(key, value)?),
            SEARCH => search_value = value.clone(),
            SORT => sort_columns = Some(value.as_str()),
            SORT_DIR => sort_directions = Some(value.as_str()),
            other => {
                // anything unprefixed, such as cache busters, is ignored
                if let Some(column_id) = other.strip_prefix(FILTER_PREFIX) {
                    let column = filter_column(collection, column_id)?;
                    let filter = decode_filter_value(column, value)?;

                    column_filters.insert(column_id.to_string(), filter);
                }
            }
        }
    }

    let page_index = match page {
        None => 0,
        Some(0) => return Err(EncodingError::InvalidPage),
        Some(page) => u32::try_from(page - 1).map_err(|_| EncodingError::InvalidNumber {
            param: PAGE.to_string(),
            value: page.to_string(),
        })?,
    };

    let page_size = page_size.unwrap_or(limits.default_page_size);
    if page_size == 0 {
        return Err(EncodingError::InvalidPageSize);
    }
    if page_size > limits.max_page_size {
        return Err(EncodingError::PageSizeTooLarge {
            requested: page_size,
            max: limits.max_page_size,
        });
    }

    Ok(QueryState {
        page_index,
        page_size,
        sort: decode_sort(sort_columns, sort_directions)?,
        column_filters,
        search_value,
    })
}

fn decode_sort(
    columns: Option<&str>,
    directions: Option<&str>,
) -> Result<Vec<SortSpec>, EncodingError> {
    let columns: Vec<&str> = match columns {
        Some(columns) if !columns.is_empty() => columns.split(LIST_SEPARATOR).collect(),
        _ => return Ok(Vec::new()),
    };

    let directions = match directions {
        Some(directions) if !directions.is_empty() => directions
            .split(LIST_SEPARATOR)
            .map(str::parse)
            .collect::<Result<Vec<SortDirection>, _>>()?,
        _ => vec![SortDirection::Asc; columns.len()],
    };

    if columns.len() != directions.len() {
        return Err(EncodingError::SortLengthMismatch {
            columns: columns.len(),
            directions: directions.len(),
        });
    }

    columns
        .into_iter()
        .zip(directions)
        .map(|(column_id, direction)| {
            check_sort_column(column_id)?;

            Ok(SortSpec {
                column_id: column_id.to_string(),
                direction,
            })
        })
        .collect()
}

fn check_sort_column(column_id: &str) -> Result<(), EncodingError> {
    if column_id.is_empty() || column_id.contains(LIST_SEPARATOR) {
        return Err(EncodingError::InvalidSortColumn(column_id.to_string()));
    }

    Ok(())
}

fn filter_column(collection: Collection, column_id: &str) -> Result<&'static ColumnDef, EncodingError> {
    collection
        .column(column_id)
        .filter(|column| column.filterable)
        .ok_or_else(|| EncodingError::UnknownFilterColumn(column_id.to_string()))
}

fn check_filter_value(column: &ColumnDef, value: &FilterValue) -> Result<(), EncodingError> {
    let invalid = |reason: String| EncodingError::InvalidFilterValue {
        column: column.id.to_string(),
        reason,
    };

    match (column.kind, value) {
        (ColumnKind::Text, FilterValue::Text(_))
        | (ColumnKind::Integer, FilterValue::Integer(_))
        | (ColumnKind::Bool, FilterValue::Bool(_)) => Ok(()),
        (ColumnKind::Enum(allowed), FilterValue::OneOf(values)) => {
            if values.is_empty() {
                return Err(invalid("expected at least one value".to_string()));
            }

            match values.iter().find(|value| !allowed.contains(&value.as_str())) {
                Some(unknown) => Err(invalid(format!(
                    "`{unknown}` is not one of {}",
                    allowed.join(", ")
                ))),
                None => Ok(()),
            }
        }
        (kind, _) => Err(invalid(format!("expected a {} value", kind_name(kind)))),
    }
}

fn encode_filter_value(value: &FilterValue) -> String {
    match value {
        FilterValue::Text(text) => text.clone(),
        FilterValue::Integer(number) => number.to_string(),
        FilterValue::Bool(flag) => flag.to_string(),
        FilterValue::OneOf(values) => join(values.iter().map(String::as_str)),
    }
}

fn decode_filter_value(column: &ColumnDef, raw: &str) -> Result<FilterValue, EncodingError> {
    let invalid = || EncodingError::InvalidFilterValue {
        column: column.id.to_string(),
        reason: format!("`{raw}` is not a {} value", kind_name(column.kind)),
    };

    let value = match column.kind {
        ColumnKind::Text => FilterValue::Text(raw.to_string()),
        ColumnKind::Integer => FilterValue::Integer(raw.parse().map_err(|_| invalid())?),
        ColumnKind::Bool => match raw {
            "true" => FilterValue::Bool(true),
            "false" => FilterValue::Bool(false),
            _ => return Err(invalid()),
        },
        ColumnKind::Enum(_) => FilterValue::OneOf(
            raw.split(LIST_SEPARATOR)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        ColumnKind::Timestamp => return Err(invalid()),
    };

    check_filter_value(column, &value)?;

    Ok(value)
}

fn parse_number<T: std::str::FromStr>(param: &str, value: &str) -> Result<T, EncodingError> {
    value.parse().map_err(|_| EncodingError::InvalidNumber {
        param: param.to_string(),
        value: value.to_string(),
    })
}

fn kind_name(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Integer => "integer",
        ColumnKind::Text => "text",
        ColumnKind::Bool => "boolean",
        ColumnKind::Enum(_) => "enumerated",
        ColumnKind::Timestamp => "timestamp",
    }
}

fn join<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<Vec<_>>().join(",")
}
