use crate::errors::ApiResult;
use crate::routes::{Mutation, created, done};
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use libris_core::database::types::{AuthorPatch, AuthorRecord, NewAuthor};
use libris_core::sorting::SortRequest;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/authors", get(list).post(create))
        .route("/api/authors/{id}", get(fetch).put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    Query(sort): Query<SortRequest>,
) -> ApiResult<Json<Vec<AuthorRecord>>> {
    Ok(Json(state.library.authors.list(&sort).await?))
}

async fn fetch(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<AuthorRecord>> {
    let Path(id) = id?;
    Ok(Json(state.library.authors.get(id).await?))
}

async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewAuthor>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Mutation>)> {
    let Json(new) = payload?;
    let author = state.library.authors.create(new).await?;
    Ok(created("Author created successfully", author.id))
}

async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<AuthorPatch>, JsonRejection>,
) -> ApiResult<Json<Mutation>> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    state.library.authors.update(id, patch).await?;
    Ok(done("Author updated successfully"))
}

async fn remove(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Mutation>> {
    let Path(id) = id?;
    state.library.authors.delete(id).await?;
    Ok(done("Author deleted successfully"))
}
