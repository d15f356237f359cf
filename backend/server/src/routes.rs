use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use protocol::{
    Access, Collection, Course, Newsletter, Partner, Post, Product, QueryParams, QueryState, User,
    decode, normalize,
};
use tracing::{debug, info};

use crate::{
    auth::{Caller, authorize},
    database::SqlRecord,
    error::AppError,
    search,
    state::AppState,
    utils::parse_id,
};

pub async fn health_handler() -> &'static str {
    "ok"
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    caller: Caller,
    Query(params): Query<QueryParams>,
) -> Result<Response, AppError> {
    let collection = parse_collection(&name)?;
    authorize(&state.database, &caller, collection.access()).await?;

    let query = decode(&params, collection, state.config.limits())?;
    debug!("Listing {collection}: {query:?}");

    match collection {
        Collection::Users => list::<User>(&state, query).await,
        Collection::Courses => list::<Course>(&state, query).await,
        Collection::Newsletters => list::<Newsletter>(&state, query).await,
        Collection::Posts => list::<Post>(&state, query).await,
        Collection::Products => list::<Product>(&state, query).await,
        Collection::Partners => list::<Partner>(&state, query).await,
    }
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, String)>,
    caller: Caller,
) -> Result<StatusCode, AppError> {
    let collection = parse_collection(&name)?;
    authorize(&state.database, &caller, Access::Admin).await?;
    let id = parse_id(&id)?;

    if !state.database.delete(collection, id).await? {
        return Err(AppError::NotFound);
    }

    info!("Deleted {collection} {id}");

    Ok(StatusCode::NO_CONTENT)
}

async fn list<R: SqlRecord>(state: &AppState, query: QueryState) -> Result<Response, AppError> {
    let request = query.page_request();
    search::validate(R::COLLECTION, &request)?;

    let outcome = state.database.fetch_page::<R>(&request).await;
    let envelope = normalize(query.page_index, query.page_size, outcome)?;

    Ok(Json(envelope).into_response())
}

fn parse_collection(name: &str) -> Result<Collection, AppError> {
    name.parse()
        .map_err(|_| AppError::UnknownCollection(name.to_string()))
}
