//! # SQLite
//!
//! Relational store behind every collection listing.
//!
//! ## Requirements
//!
//! - Page rows and total count must agree with each other
//! - Bounded execution time per query
//! - Never block the async runtime
//!
//! ## Implementation
//!
//! - One connection behind a mutex, used from the blocking pool
//! - Page and count queries share a transaction
//! - Each job races a timeout; an elapsed job reports [`ExecutionError::Timeout`]
//!   and its result, if any, is dropped
//! - Timestamps are stored as text in one fixed format so that they order
//!   lexically
use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use protocol::{
    Course, ExecutionError, Newsletter, PageRequest, Partner, Post, Product, RawPage, Record, User,
};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter, types::Value};
use serde::Serialize;
use tokio::{task::spawn_blocking, time::timeout};

use crate::{
    auth::Principal,
    search::{SelectQuery, register_fold_case},
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS courses (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        category TEXT NOT NULL,
        level TEXT NOT NULL,
        published INTEGER NOT NULL DEFAULT 0,
        price_cents INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS newsletters (
        id INTEGER PRIMARY KEY,
        subject TEXT NOT NULL,
        status TEXT NOT NULL,
        recipients INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS community_posts (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        author TEXT NOT NULL,
        status TEXT NOT NULL,
        reports INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        price_cents INTEGER NOT NULL,
        discount_percent INTEGER NOT NULL DEFAULT 0,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS partners (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        website TEXT NOT NULL,
        tier TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        expires_at TEXT NOT NULL
    );
";

/// A collection row that can be read from and written to its table.
///
/// `values` must follow the order of the collection's column catalog.
pub trait SqlRecord: Record + Serialize + Send + Sized + 'static {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn values(&self) -> Vec<Value>;
}

#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
    timeout: Duration,
}

impl Database {
    pub fn open(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, ExecutionError> {
        Self::from_connection(Connection::open(path).map_err(unavailable)?, timeout)
    }

    pub fn open_in_memory(timeout: Duration) -> Result<Self, ExecutionError> {
        Self::from_connection(Connection::open_in_memory().map_err(unavailable)?, timeout)
    }

    fn from_connection(connection: Connection, timeout: Duration) -> Result<Self, ExecutionError> {
        connection
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(unavailable)?;
        register_fold_case(&connection).map_err(unavailable)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            timeout,
        })
    }

    pub async fn migrate(&self) -> Result<(), ExecutionError> {
        self.run(|connection| connection.execute_batch(SCHEMA)).await
    }

    /// Runs `job` on the blocking pool under the configured timeout.
    pub async fn run<T, F>(&self, job: F) -> Result<T, ExecutionError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);

        let task = spawn_blocking(move || {
            let mut connection = connection
                .lock()
                .map_err(|_| ExecutionError::Unavailable("connection lock poisoned".to_string()))?;

            job(&mut connection).map_err(execution_error)
        });

        match timeout(self.timeout, task).await {
            Err(_) => Err(ExecutionError::Timeout(self.timeout)),
            Ok(Err(e)) => Err(ExecutionError::Unavailable(e.to_string())),
            Ok(Ok(result)) => result,
        }
    }

    pub async fn fetch_page<R: SqlRecord>(
        &self,
        request: &PageRequest,
    ) -> Result<RawPage<R>, ExecutionError> {
        let query = SelectQuery::build(R::COLLECTION, request)
            .map_err(|e| ExecutionError::Query(e.to_string()))?;

        self.run(move |connection| {
            let transaction = connection.transaction()?;

            let total_count: i64 = transaction.query_row(
                &query.count_sql,
                params_from_iter(&query.filter_params),
                |row| row.get(0),
            )?;

            let rows = {
                let mut statement = transaction.prepare(&query.rows_sql)?;
                let rows = statement
                    .query_map(params_from_iter(&query.row_params), R::from_row)?
                    .collect::<rusqlite::Result<Vec<R>>>()?;
                rows
            };

            transaction.commit()?;

            Ok(RawPage {
                rows,
                total_count: u64::try_from(total_count).unwrap_or_default(),
            })
        })
        .await
    }

    pub async fn insert<R: SqlRecord>(&self, records: Vec<R>) -> Result<usize, ExecutionError> {
        let collection = R::COLLECTION;
        let columns = collection.columns();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            collection.table(),
            columns
                .iter()
                .map(|column| column.field)
                .collect::<Vec<_>>()
                .join(", "),
            (1..=columns.len())
                .map(|slot| format!("?{slot}"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        self.run(move |connection| {
            let transaction = connection.transaction()?;

            {
                let mut statement = transaction.prepare(&sql)?;
                for record in &records {
                    statement.execute(params_from_iter(record.values()))?;
                }
            }

            transaction.commit()?;

            Ok(records.len())
        })
        .await
    }

    /// Removes one row; `false` when no row had that id.
    pub async fn delete(&self, collection: protocol::Collection, id: i64) -> Result<bool, ExecutionError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", collection.table());

        self.run(move |connection| Ok(connection.execute(&sql, params![id])? > 0))
            .await
    }

    /// Empties a collection's table. Clearing users also ends their sessions.
    pub async fn clear(&self, collection: protocol::Collection) -> Result<usize, ExecutionError> {
        let sql = format!("DELETE FROM {}", collection.table());

        self.run(move |connection| connection.execute(&sql, [])).await
    }

    pub async fn create_session(
        &self,
        token: String,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ExecutionError> {
        self.run(move |connection| {
            connection.execute(
                "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![token, user_id, timestamp(expires_at)],
            )?;

            Ok(())
        })
        .await
    }

    /// Active user behind an unexpired session token.
    pub async fn session_principal(&self, token: String) -> Result<Option<Principal>, ExecutionError> {
        let now = timestamp(Utc::now());

        self.run(move |connection| {
            connection
                .query_row(
                    "SELECT users.id, users.name, users.role
                     FROM sessions JOIN users ON users.id = sessions.user_id
                     WHERE sessions.token = ?1 AND sessions.expires_at > ?2 AND users.active = 1",
                    params![token, now],
                    |row| {
                        Ok(Principal {
                            user_id: row.get(0)?,
                            name: row.get(1)?,
                            role: row.get::<_, String>(2)?.parse().unwrap_or_default(),
                        })
                    },
                )
                .optional()
        })
        .await
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.connection)
    }
}

/// Text form used for every stored timestamp.
pub fn timestamp(at: DateTime<Utc>) -> Value {
    Value::Text(at.format("%F %T%.f%:z").to_string())
}

fn execution_error(e: rusqlite::Error) -> ExecutionError {
    match e.sqlite_error_code() {
        Some(
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::SystemIoFailure,
        ) => unavailable(e),
        _ => ExecutionError::Query(e.to_string()),
    }
}

fn unavailable(e: rusqlite::Error) -> ExecutionError {
    ExecutionError::Unavailable(e.to_string())
}

fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

impl SqlRecord for User {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            role: row.get("role")?,
            active: row.get("active")?,
            created_at: row.get("created_at")?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Text(self.name.clone()),
            Value::Text(self.email.clone()),
            Value::Text(self.role.clone()),
            flag(self.active),
            timestamp(self.created_at),
        ]
    }
}

impl SqlRecord for Course {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            slug: row.get("slug")?,
            category: row.get("category")?,
            level: row.get("level")?,
            published: row.get("published")?,
            price_cents: row.get("price_cents")?,
            created_at: row.get("created_at")?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Text(self.title.clone()),
            Value::Text(self.slug.clone()),
            Value::Text(self.category.clone()),
            Value::Text(self.level.clone()),
            flag(self.published),
            Value::Integer(self.price_cents),
            timestamp(self.created_at),
        ]
    }
}

impl SqlRecord for Newsletter {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            subject: row.get("subject")?,
            status: row.get("status")?,
            recipients: row.get("recipients")?,
            created_at: row.get("created_at")?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Text(self.subject.clone()),
            Value::Text(self.status.clone()),
            Value::Integer(self.recipients),
            timestamp(self.created_at),
        ]
    }
}

impl SqlRecord for Post {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            author: row.get("author")?,
            status: row.get("status")?,
            reports: row.get("reports")?,
            created_at: row.get("created_at")?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Text(self.title.clone()),
            Value::Text(self.author.clone()),
            Value::Text(self.status.clone()),
            Value::Integer(self.reports),
            timestamp(self.created_at),
        ]
    }
}

impl SqlRecord for Product {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            kind: row.get("kind")?,
            price_cents: row.get("price_cents")?,
            discount_percent: row.get("discount_percent")?,
            active: row.get("active")?,
            created_at: row.get("created_at")?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Text(self.name.clone()),
            Value::Text(self.kind.clone()),
            Value::Integer(self.price_cents),
            Value::Integer(self.discount_percent),
            flag(self.active),
            timestamp(self.created_at),
        ]
    }
}

impl SqlRecord for Partner {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            website: row.get("website")?,
            tier: row.get("tier")?,
            active: row.get("active")?,
            created_at: row.get("created_at")?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Text(self.name.clone()),
            Value::Text(self.website.clone()),
            Value::Text(self.tier.clone()),
            flag(self.active),
            timestamp(self.created_at),
        ]
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use protocol::{FilterValue, QueryState, SortSpec};

    use super::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 9, 0, 0).unwrap()
    }

    fn user(id: i64, name: &str, role: &str, active: bool) -> User {
        User {
            id,
            name: name.to_string(),
            email: format!("{}@campus.test", name.to_lowercase().replace(' ', ".")),
            role: role.to_string(),
            active,
            created_at: at(1 + (id % 28) as u32),
        }
    }

    async fn database() -> Database {
        let database = Database::open_in_memory(Duration::from_secs(5)).unwrap();
        database.migrate().await.unwrap();
        database
            .insert(vec![
                user(1, "Ada Lovelace", "admin", true),
                user(2, "Alan Turing", "instructor", true),
                user(3, "Grace Hopper", "instructor", false),
                user(4, "Edsger Dijkstra", "student", true),
                user(5, "Barbara Liskov", "student", true),
                user(6, "Donald Knuth", "student", false),
            ])
            .await
            .unwrap();
        database
    }

    fn ids(page: &RawPage<User>) -> Vec<i64> {
        page.rows.iter().map(|user| user.id).collect()
    }

    #[tokio::test]
    async fn test_unsorted_pages_follow_primary_key() {
        let database = database().await;
        let mut state = QueryState::with_page_size(4);

        let first = database.fetch_page::<User>(&state.page_request()).await.unwrap();
        assert_eq!(ids(&first), vec![1, 2, 3, 4]);
        assert_eq!(first.total_count, 6);

        state.page_index = 1;
        let second = database.fetch_page::<User>(&state.page_request()).await.unwrap();
        assert_eq!(ids(&second), vec![5, 6]);
        assert_eq!(second.total_count, 6);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_across_fields() {
        let database = database().await;
        let mut state = QueryState::default();

        state.search_value = "ALAN".to_string();
        let by_name = database.fetch_page::<User>(&state.page_request()).await.unwrap();
        assert_eq!(ids(&by_name), vec![2]);

        state.search_value = "liskov@".to_string();
        let by_email = database.fetch_page::<User>(&state.page_request()).await.unwrap();
        assert_eq!(ids(&by_email), vec![5]);

        state.search_value = "a".to_string();
        let broad = database.fetch_page::<User>(&state.page_request()).await.unwrap();
        assert_eq!(broad.total_count, 6);
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let database = database().await;
        database
            .insert(vec![
                user(7, "Émile Zola", "student", true),
                user(8, "Ölga Ñúñez", "student", true),
            ])
            .await
            .unwrap();
        let mut state = QueryState::default();

        for search in ["émile", "ÉMILE", "Émile"] {
            state.search_value = search.to_string();
            let page = database.fetch_page::<User>(&state.page_request()).await.unwrap();
            assert_eq!(ids(&page), vec![7], "searching {search}");
        }

        state.search_value = "ÑÚÑ".to_string();
        let page = database.fetch_page::<User>(&state.page_request()).await.unwrap();
        assert_eq!(ids(&page), vec![8]);
    }

    #[tokio::test]
    async fn test_filters_and_search_combine() {
        let database = database().await;
        let mut state = QueryState::with_page_size(1);
        state.column_filters.insert(
            "role".to_string(),
            FilterValue::OneOf(vec!["instructor".to_string(), "student".to_string()]),
        );
        state
            .column_filters
            .insert("active".to_string(), FilterValue::Bool(true));

        let page = database.fetch_page::<User>(&state.page_request()).await.unwrap();
        assert_eq!(ids(&page), vec![2]);
        assert_eq!(page.total_count, 3);

        state.search_value = "dijkstra".to_string();
        let page = database.fetch_page::<User>(&state.page_request()).await.unwrap();
        assert_eq!(ids(&page), vec![4]);
        assert_eq!(page.total_count, 1);
    }

    #[tokio::test]
    async fn test_sort_with_tiebreak() {
        let database = database().await;
        let mut state = QueryState::default();
        state.sort = vec![SortSpec::asc("role")];

        let page = database.fetch_page::<User>(&state.page_request()).await.unwrap();
        assert_eq!(ids(&page), vec![1, 2, 3, 4, 5, 6]);

        state.sort = vec![SortSpec::desc("role")];
        let page = database.fetch_page::<User>(&state.page_request()).await.unwrap();
        assert_eq!(ids(&page), vec![4, 5, 6, 2, 3, 1]);
    }

    #[tokio::test]
    async fn test_page_past_the_end_keeps_total() {
        let database = database().await;
        let mut state = QueryState::with_page_size(10);
        state.page_index = 5;

        let page = database.fetch_page::<User>(&state.page_request()).await.unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.total_count, 6);
    }

    #[tokio::test]
    async fn test_delete() {
        let database = database().await;

        assert!(database.delete(protocol::Collection::Users, 3).await.unwrap());
        assert!(!database.delete(protocol::Collection::Users, 3).await.unwrap());

        let page = database
            .fetch_page::<User>(&QueryState::default().page_request())
            .await
            .unwrap();
        assert_eq!(page.total_count, 5);
    }

    #[tokio::test]
    async fn test_clearing_users_ends_sessions() {
        let database = database().await;
        let tomorrow = Utc::now() + chrono::Duration::days(1);
        database.create_session("live".to_string(), 1, tomorrow).await.unwrap();

        assert_eq!(database.clear(protocol::Collection::Users).await.unwrap(), 6);
        assert_eq!(database.session_principal("live".to_string()).await.unwrap(), None);

        let remaining: i64 = database
            .run(|connection| connection.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_sessions() {
        let database = database().await;
        let tomorrow = Utc::now() + chrono::Duration::days(1);
        let yesterday = Utc::now() - chrono::Duration::days(1);

        database.create_session("live".to_string(), 1, tomorrow).await.unwrap();
        database.create_session("stale".to_string(), 2, yesterday).await.unwrap();
        database.create_session("inactive".to_string(), 3, tomorrow).await.unwrap();

        let principal = database.session_principal("live".to_string()).await.unwrap().unwrap();
        assert_eq!(principal.user_id, 1);
        assert_eq!(principal.role, crate::auth::Role::Admin);

        for token in ["stale", "inactive", "missing"] {
            assert_eq!(database.session_principal(token.to_string()).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_timeout_is_an_execution_error() {
        let database = Database::open_in_memory(Duration::from_millis(50)).unwrap();
        database.migrate().await.unwrap();

        let connection = database.connection();
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = std::thread::spawn(move || {
            let _guard = connection.lock().unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(500));
        });
        locked_rx.recv().unwrap();

        let outcome = database
            .fetch_page::<User>(&QueryState::default().page_request())
            .await;
        assert_eq!(outcome, Err(ExecutionError::Timeout(Duration::from_millis(50))));

        holder.join().unwrap();
    }
}
