use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

/// Rows for one page plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage<R> {
    pub rows: Vec<R>,
    pub total_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-based.
    pub page: u64,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Response body of every collection listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEnvelope<R> {
    pub data: Vec<R>,
    pub total_count: u64,
    pub page_count: u64,
    pub pagination: Pagination,
}

impl<R> CollectionEnvelope<R> {
    pub fn rows(&self) -> &[R] {
        &self.data
    }
}

/// `ceil(total_count / page_size)`, zero for an empty set.
pub fn page_count(total_count: u64, page_size: u32) -> u64 {
    match page_size {
        0 => 0,
        size => total_count.div_ceil(u64::from(size)),
    }
}

/// Shapes executor output into a [`CollectionEnvelope`].
///
/// Failures pass through untouched so that "no rows" and "query failed"
/// never look alike to the caller.
pub fn normalize<R>(
    page_index: u32,
    page_size: u32,
    outcome: Result<RawPage<R>, ExecutionError>,
) -> Result<CollectionEnvelope<R>, ExecutionError> {
    let RawPage { rows, total_count } = outcome?;

    if rows.len() > page_size as usize {
        return Err(ExecutionError::RowOverflow {
            rows: rows.len(),
            page_size,
        });
    }

    let page_count = page_count(total_count, page_size);
    let page = u64::from(page_index) + 1;

    Ok(CollectionEnvelope {
        data: rows,
        total_count,
        page_count,
        pagination: Pagination {
            page,
            page_size,
            total_items: total_count,
            total_pages: page_count,
            has_next_page: page < page_count,
            has_previous_page: page_index > 0,
        },
    })
}
