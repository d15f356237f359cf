use std::{collections::BTreeMap, fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EncodingError;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(EncodingError::InvalidSortDirection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub column_id: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Typed value of a single column filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Bool(bool),
    /// Matches rows whose column equals any of the listed values.
    OneOf(Vec<String>),
}

pub type ColumnFilters = BTreeMap<String, FilterValue>;

/// What page, ordering, filters and search text a list view wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState {
    pub page_index: u32,
    pub page_size: u32,
    pub sort: Vec<SortSpec>,
    pub column_filters: ColumnFilters,
    pub search_value: String,
}

impl Default for QueryState {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl QueryState {
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            page_index: 0,
            page_size,
            sort: Vec::new(),
            column_filters: ColumnFilters::new(),
            search_value: String::new(),
        }
    }

    /// Zero-based offset of the first row on the current page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page_index) * u64::from(self.page_size)
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            offset: self.offset(),
            limit: self.page_size,
            sort: self.sort.clone(),
            filters: self.column_filters.clone(),
            search: normalize_search(&self.search_value),
        }
    }
}

/// Executor input derived from a [`QueryState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u32,
    pub sort: Vec<SortSpec>,
    pub filters: ColumnFilters,
    pub search: Option<String>,
}

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static whitespace pattern"));

/// Trims and collapses whitespace; blank input means no search at all.
pub fn normalize_search(input: &str) -> Option<String> {
    let collapsed = WHITESPACE.replace_all(input.trim(), " ");

    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}
