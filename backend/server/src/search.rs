//! # Collection queries
//!
//! Compiles a [`PageRequest`] into the two SQL statements a listing needs.
//!
//!
//!
//! ## Statements
//! - Rows: `SELECT <catalog fields> FROM <table> WHERE ... ORDER BY ... LIMIT ? OFFSET ?`
//! - Count: `SELECT COUNT(*) FROM <table> WHERE ...`, same predicate, no pagination
//!
//! Both run in one transaction so the count always describes the rows.
//!
//!
//!
//! ## Predicate
//! - Search: case-insensitive substring over every searchable column, OR-combined.
//!   Both sides are folded with [`FOLD_CASE`], registered on the connection by
//!   [`register_fold_case`], because SQLite's `lower()` only folds ASCII
//! - Column filters: exact match, or `IN (...)` for enumerated values
//! - Search and filters are AND-combined
//!
//!
//!
//! ## Ordering
//! Requested sort columns come first. The primary key, ascending, is always
//! appended unless the caller already sorts by it, so that pages stay stable
//! across requests even when nothing is sorted explicitly.
//!
//! Field names are only ever taken from the static column catalog, never from
//! the request, so they are safe to splice into the statement text.
use protocol::{Collection, FilterValue, PRIMARY_KEY, PageRequest, SortDirection, SortSpec};
use rusqlite::{
    Connection,
    functions::FunctionFlags,
    types::{Value, ValueRef},
};
use thiserror::Error;

/// SQL function that lowercases text the same way `str::to_lowercase` does.
pub const FOLD_CASE: &str = "fold_case";

pub fn register_fold_case(connection: &Connection) -> rusqlite::Result<()> {
    connection.create_scalar_function(
        FOLD_CASE,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |context| {
            Ok(match context.get_raw(0) {
                ValueRef::Text(text) => Value::Text(String::from_utf8_lossy(text).to_lowercase()),
                other => Value::from(other),
            })
        },
    )
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Cannot sort {collection} by `{column}`")]
    UnsortableColumn {
        collection: Collection,
        column: String,
    },

    #[error("Cannot filter {collection} by `{column}`")]
    UnfilterableColumn {
        collection: Collection,
        column: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub rows_sql: String,
    pub count_sql: String,
    /// Bound by the count statement.
    pub filter_params: Vec<Value>,
    /// Bound by the rows statement: the filter params plus limit and offset.
    pub row_params: Vec<Value>,
}

/// Rejects requests the catalog cannot serve, before any SQL is built.
pub fn validate(collection: Collection, request: &PageRequest) -> Result<(), QueryError> {
    for spec in &request.sort {
        sort_field(collection, spec)?;
    }

    for column_id in request.filters.keys() {
        filter_field(collection, column_id)?;
    }

    Ok(())
}

impl SelectQuery {
    pub fn build(collection: Collection, request: &PageRequest) -> Result<Self, QueryError> {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if let Some(search) = &request.search {
            params.push(Value::Text(format!(
                "%{}%",
                escape_like(&search.to_lowercase())
            )));
            let slot = params.len();

            let matches = collection
                .searchable()
                .map(|column| {
                    format!("{FOLD_CASE}({}) LIKE ?{slot} ESCAPE '\\'", column.field)
                })
                .collect::<Vec<_>>()
                .join(" OR ");

            clauses.push(format!("({matches})"));
        }

        for (column_id, value) in &request.filters {
            let field = filter_field(collection, column_id)?;

            let clause = match value {
                FilterValue::OneOf(values) => {
                    let slots = values
                        .iter()
                        .map(|value| {
                            params.push(Value::Text(value.clone()));
                            format!("?{}", params.len())
                        })
                        .collect::<Vec<_>>()
                        .join(", ");

                    format!("{field} IN ({slots})")
                }
                FilterValue::Text(text) => equals(&mut params, field, Value::Text(text.clone())),
                FilterValue::Integer(number) => equals(&mut params, field, Value::Integer(*number)),
                FilterValue::Bool(flag) => {
                    equals(&mut params, field, Value::Integer(i64::from(*flag)))
                }
            };

            clauses.push(clause);
        }

        let predicate = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let mut order = request
            .sort
            .iter()
            .map(|spec| {
                let field = sort_field(collection, spec)?;
                let direction = match spec.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };

                Ok(format!("{field} {direction}"))
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        if !request.sort.iter().any(|spec| spec.column_id == PRIMARY_KEY) {
            order.push(format!("{PRIMARY_KEY} ASC"));
        }

        let table = collection.table();
        let fields = collection
            .columns()
            .iter()
            .map(|column| column.field)
            .collect::<Vec<_>>()
            .join(", ");

        let filter_params = params.clone();
        params.push(Value::Integer(i64::from(request.limit)));
        params.push(Value::Integer(
            i64::try_from(request.offset).unwrap_or(i64::MAX),
        ));
        let (limit_slot, offset_slot) = (params.len() - 1, params.len());

        Ok(Self {
            rows_sql: format!(
                "SELECT {fields} FROM {table}{predicate} ORDER BY {} LIMIT ?{limit_slot} OFFSET ?{offset_slot}",
                order.join(", ")
            ),
            count_sql: format!("SELECT COUNT(*) FROM {table}{predicate}"),
            filter_params,
            row_params: params,
        })
    }
}

fn equals(params: &mut Vec<Value>, field: &str, value: Value) -> String {
    params.push(value);
    format!("{field} = ?{}", params.len())
}

fn sort_field(collection: Collection, spec: &SortSpec) -> Result<&'static str, QueryError> {
    collection
        .column(&spec.column_id)
        .filter(|column| column.sortable)
        .map(|column| column.field)
        .ok_or_else(|| QueryError::UnsortableColumn {
            collection,
            column: spec.column_id.clone(),
        })
}

fn filter_field(collection: Collection, column_id: &str) -> Result<&'static str, QueryError> {
    collection
        .column(column_id)
        .filter(|column| column.filterable)
        .map(|column| column.field)
        .ok_or_else(|| QueryError::UnfilterableColumn {
            collection,
            column: column_id.to_string(),
        })
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());

    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

#[cfg(test)]
mod tests {
    use protocol::{ColumnFilters, QueryState};

    use super::*;

    fn request(state: QueryState) -> PageRequest {
        state.page_request()
    }

    #[test]
    fn test_unsorted_falls_back_to_primary_key() {
        let query = SelectQuery::build(Collection::Partners, &request(QueryState::default())).unwrap();

        assert_eq!(
            query.rows_sql,
            "SELECT id, name, website, tier, active, created_at FROM partners ORDER BY id ASC LIMIT ?1 OFFSET ?2"
        );
        assert_eq!(query.count_sql, "SELECT COUNT(*) FROM partners");
        assert!(query.filter_params.is_empty());
        assert_eq!(query.row_params, vec![Value::Integer(10), Value::Integer(0)]);
    }

    #[test]
    fn test_primary_key_sort_is_not_repeated() {
        let mut state = QueryState::default();
        state.sort = vec![SortSpec::desc("id")];

        let query = SelectQuery::build(Collection::Users, &request(state)).unwrap();
        assert!(query.rows_sql.contains("ORDER BY id DESC LIMIT"));
    }

    #[test]
    fn test_sort_then_tiebreak() {
        let mut state = QueryState::default();
        state.sort = vec![SortSpec::asc("priceCents"), SortSpec::desc("createdAt")];

        let query = SelectQuery::build(Collection::Courses, &request(state)).unwrap();
        assert!(
            query
                .rows_sql
                .contains("ORDER BY price_cents ASC, created_at DESC, id ASC")
        );
    }

    #[test]
    fn test_search_and_filters() {
        let mut state = QueryState::with_page_size(5);
        state.page_index = 4;
        state.search_value = "  50%  Off ".to_string();
        let mut filters = ColumnFilters::new();
        filters.insert("active".to_string(), FilterValue::Bool(true));
        filters.insert(
            "kind".to_string(),
            FilterValue::OneOf(vec!["course".to_string(), "bundle".to_string()]),
        );
        state.column_filters = filters;

        let query = SelectQuery::build(Collection::Products, &request(state)).unwrap();

        assert_eq!(
            query.count_sql,
            "SELECT COUNT(*) FROM products WHERE (fold_case(name) LIKE ?1 ESCAPE '\\') AND active = ?2 AND kind IN (?3, ?4)"
        );
        assert!(query.rows_sql.ends_with("ORDER BY id ASC LIMIT ?5 OFFSET ?6"));
        assert_eq!(
            query.filter_params,
            vec![
                Value::Text("%50\\% off%".to_string()),
                Value::Integer(1),
                Value::Text("course".to_string()),
                Value::Text("bundle".to_string()),
            ]
        );
        assert_eq!(&query.row_params[4..], &[Value::Integer(5), Value::Integer(20)]);
    }

    #[test]
    fn test_search_spans_every_searchable_column() {
        let mut state = QueryState::default();
        state.search_value = "ada".to_string();

        let query = SelectQuery::build(Collection::Users, &request(state)).unwrap();
        assert!(query.count_sql.contains(
            "(fold_case(name) LIKE ?1 ESCAPE '\\' OR fold_case(email) LIKE ?1 ESCAPE '\\')"
        ));
    }

    #[test]
    fn test_validate_rejects_unsortable_column() {
        let mut state = QueryState::default();
        state.sort = vec![SortSpec::asc("website")];

        assert_eq!(
            validate(Collection::Partners, &request(state)),
            Err(QueryError::UnsortableColumn {
                collection: Collection::Partners,
                column: "website".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_rejects_unknown_sort_column() {
        let mut state = QueryState::default();
        state.sort = vec![SortSpec::asc("popularity")];

        assert!(validate(Collection::Courses, &request(state)).is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%_\\"), "100\\%\\_\\\\");
    }
}
