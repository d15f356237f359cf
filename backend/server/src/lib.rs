//! HTTP API for the paginated list views of a course platform dashboard.
//!
//!
//!
//! # General Infrastructure
//! - Every list view (users, courses, newsletters, community posts, products, partners)
//!   reads one collection through `GET /api/{collection}`
//! - The client keeps the whole list state (page, sort, filters, search) and
//!   encodes it into the query string, see the `protocol` crate
//! - The server decodes it, runs one filtered page query plus a matching
//!   count against SQLite, and answers with a `CollectionEnvelope`
//! - Mutations are separate endpoints; the client refetches after them
//!
//!
//!
//! # Endpoints
//!
//! | Method   | Path                     | Access               |
//! |----------|--------------------------|----------------------|
//! | `GET`    | `/health`                | anyone               |
//! | `GET`    | `/api/{collection}`      | per collection       |
//! | `DELETE` | `/api/{collection}/{id}` | admin                |
//!
//! Errors are JSON `{ "error": "..." }`:
//! - `400` malformed query string or a column the collection cannot sort or filter by
//! - `401` a non-public collection without a live session token
//! - `403` a session whose role is below the collection's access level
//! - `404` unknown collection or row
//! - `500` datastore failure or a query that exceeded `QUERY_TIMEOUT_MS`
//!
//!
//!
//! # Notes
//!
//! ## Stable paging
//! Every `ORDER BY` ends with `id ASC`. Without it, rows that tie on the
//! requested sort could swap between two page requests and show up twice or
//! not at all.
//!
//! ## Empty is not failed
//! An empty page is a normal `200` envelope with `pageCount: 0`. A failing
//! query is always a `500`, never an empty envelope.
//!
//!
//!
//! # Setup
//!
//! Create and seed the database, printing an admin token.
//! ```sh
//! cargo run -p process -- --database campus.db
//! ```
//!
//! Run the server.
//! ```sh
//! RUST_LOG=info cargo run -p campus
//! ```
//!
//! Walk a collection page by page.
//! ```sh
//! cargo run -p tester -- courses --page-size 5
//! ```
use std::sync::Arc;

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{delete, get},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod routes;
pub mod search;
pub mod state;
pub mod utils;

use config::Config;
use routes::{delete_handler, health_handler, list_handler};
use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(state.config.cors_max_age);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/{collection}", get(list_handler))
        .route("/api/{collection}/{id}", delete(delete_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config).await?;

    info!("Starting server...");
    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use link::{FetchError, HttpSource, SyncConfig, Synchronizer};
    use protocol::{Collection, CollectionEnvelope, Course, SortSpec, User};
    use reqwest::StatusCode;
    use serde_json::Value;

    use super::*;
    use crate::database::Database;

    const ADMIN_TOKEN: &str = "admin-token";
    const STUDENT_TOKEN: &str = "student-token";

    fn course(id: i64, title: &str, category: &str, level: &str) -> Course {
        Course {
            id,
            title: title.to_string(),
            slug: title.to_lowercase().replace(' ', "-"),
            category: category.to_string(),
            level: level.to_string(),
            published: true,
            price_cents: 1_000 * id,
            created_at: Utc.with_ymd_and_hms(2025, 3, id as u32, 12, 0, 0).unwrap(),
        }
    }

    fn user(id: i64, name: &str, role: &str) -> User {
        User {
            id,
            name: name.to_string(),
            email: format!("{}@campus.test", name.to_lowercase()),
            role: role.to_string(),
            active: true,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    async fn spawn() -> String {
        let database = Database::open_in_memory(Duration::from_secs(5)).unwrap();
        let state = AppState::with_database(Config::default(), database).await.unwrap();

        state
            .database
            .insert(vec![user(1, "Root", "admin"), user(2, "Sam", "student")])
            .await
            .unwrap();
        state
            .database
            .insert(
                (1..=11)
                    .map(|id| {
                        let level = ["beginner", "intermediate", "advanced"][id as usize % 3];
                        let category = if id % 2 == 0 { "Design" } else { "Programming" };
                        course(id, &format!("Course {id}"), category, level)
                    })
                    .collect(),
            )
            .await
            .unwrap();

        let expires = Utc::now() + chrono::Duration::hours(1);
        state
            .database
            .create_session(ADMIN_TOKEN.to_string(), 1, expires)
            .await
            .unwrap();
        state
            .database
            .create_session(STUDENT_TOKEN.to_string(), 2, expires)
            .await
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = router(state);

        tokio::spawn(async move { axum::serve(listener, app).await });

        format!("http://{address}")
    }

    async fn get(url: String, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = reqwest::Client::new().get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.unwrap();
        let status = response.status();

        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn().await;
        let body = reqwest::get(format!("{base}/health")).await.unwrap().text().await.unwrap();

        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_public_listing() {
        let base = spawn().await;
        let (status, body) = get(format!("{base}/api/courses?page=2&limit=5"), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalCount"], 11);
        assert_eq!(body["pageCount"], 3);
        assert_eq!(body["pagination"]["page"], 2);
        assert_eq!(body["pagination"]["hasNextPage"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 5);
        assert_eq!(body["data"][0]["id"], 6);
        assert_eq!(body["data"][0]["priceCents"], 6000);
    }

    #[tokio::test]
    async fn test_search_filter_and_sort() {
        let base = spawn().await;
        let (status, body) = get(
            format!("{base}/api/courses?search=course%201&filter_category=Programming&sort=priceCents&sortDir=desc"),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let ids = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["id"].as_i64().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![11, 1]);
    }

    #[tokio::test]
    async fn test_access_levels() {
        let base = spawn().await;

        let (status, body) = get(format!("{base}/api/users"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = get(format!("{base}/api/users"), Some("forged")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = get(format!("{base}/api/users"), Some(STUDENT_TOKEN)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = get(format!("{base}/api/partners"), Some(STUDENT_TOKEN)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get(format!("{base}/api/users"), Some(ADMIN_TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalCount"], 2);
    }

    #[tokio::test]
    async fn test_rejections() {
        let base = spawn().await;

        let (status, body) = get(format!("{base}/api/courses?sort=popularity&sortDir=asc"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("popularity"));

        let (status, _) = get(format!("{base}/api/courses?page=0"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(format!("{base}/api/courses?filter_createdAt=2025"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(format!("{base}/api/lessons"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_an_empty_page() {
        let base = spawn().await;
        let (status, body) = get(format!("{base}/api/courses?page=9&limit=5"), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], serde_json::json!([]));
        assert_eq!(body["pageCount"], 3);
    }

    #[tokio::test]
    async fn test_delete_requires_admin() {
        let base = spawn().await;
        let client = reqwest::Client::new();

        let response = client
            .delete(format!("{base}/api/courses/3"))
            .bearer_auth(STUDENT_TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = client
            .delete(format!("{base}/api/courses/3"))
            .bearer_auth(ADMIN_TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = client
            .delete(format!("{base}/api/courses/3"))
            .bearer_auth(ADMIN_TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_synchronizer_delete_then_refetch() {
        let base = spawn().await;
        let source = HttpSource::new(&base, Collection::Courses);
        let sync =
            Synchronizer::<Course>::new(source, Collection::Courses, SyncConfig::default()).unwrap();

        sync.set_sorting(vec![SortSpec::asc("id")]).unwrap();
        sync.set_page_size(5).unwrap();
        sync.set_page_index(2).unwrap();
        let view = sync.settled().await;

        let envelope: &CollectionEnvelope<Course> = view.envelope.as_ref().unwrap();
        assert_eq!(envelope.total_count, 11);
        assert_eq!(envelope.rows().len(), 1);
        assert_eq!(view.query.page_index, 2);

        let response = reqwest::Client::new()
            .delete(format!("{base}/api/courses/11"))
            .bearer_auth(ADMIN_TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        sync.refetch().unwrap();
        let view = sync.settled().await;

        let envelope = view.envelope.as_ref().unwrap();
        assert_eq!(envelope.total_count, 10);
        assert_eq!(envelope.page_count, 2);
        assert_eq!(view.query.page_index, 1);
        assert_eq!(envelope.rows().len(), 5);
        assert_eq!(envelope.rows()[0].id, 6);
    }

    #[tokio::test]
    async fn test_synchronizer_surfaces_authorization_errors() {
        let base = spawn().await;
        let source = HttpSource::new(&base, Collection::Users);
        let sync =
            Synchronizer::<User>::new(source, Collection::Users, SyncConfig::default()).unwrap();

        sync.refetch().unwrap();
        let view = sync.settled().await;

        assert!(view.envelope.is_none());
        assert!(matches!(
            view.error,
            Some(FetchError::Authorization { status: 401, .. })
        ));
    }
}
