use crate::errors::ApiResult;
use crate::routes::{Mutation, created, done};
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use libris_core::database::types::{BookPatch, BookView, NewBook};
use libris_core::sorting::SortRequest;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/books", get(list).post(create))
        .route("/api/books/available", get(available))
        .route("/api/books/{id}", get(fetch).put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    Query(sort): Query<SortRequest>,
) -> ApiResult<Json<Vec<BookView>>> {
    Ok(Json(state.library.books.list(&sort).await?))
}

async fn available(State(state): State<AppState>) -> ApiResult<Json<Vec<BookView>>> {
    Ok(Json(state.library.books.available().await?))
}

async fn fetch(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<BookView>> {
    let Path(id) = id?;
    Ok(Json(state.library.books.get(id).await?))
}

async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewBook>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Mutation>)> {
    let Json(new) = payload?;
    let book = state.library.books.create(new).await?;
    Ok(created("Book created successfully", book.id))
}

async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<BookPatch>, JsonRejection>,
) -> ApiResult<Json<Mutation>> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    state.library.books.update(id, patch).await?;
    Ok(done("Book updated successfully"))
}

async fn remove(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Mutation>> {
    let Path(id) = id?;
    state.library.books.delete(id).await?;
    Ok(done("Book deleted successfully"))
}
