use crate::errors::ApiResult;
use crate::routes::{Mutation, created, done};
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use libris_core::database::types::{IssueView, NewIssue, StatusChange};
use libris_core::sorting::SortRequest;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/issues", get(list).post(issue))
        .route("/api/issues/active", get(active))
        .route("/api/issues/{id}", get(fetch).delete(remove))
        .route("/api/issues/{id}/return", post(return_issue))
        .route("/api/issues/{id}/status", put(update_status))
}

async fn list(
    State(state): State<AppState>,
    Query(sort): Query<SortRequest>,
) -> ApiResult<Json<Vec<IssueView>>> {
    Ok(Json(state.library.issues.list(&sort).await?))
}

async fn active(State(state): State<AppState>) -> ApiResult<Json<Vec<IssueView>>> {
    Ok(Json(state.library.issues.active().await?))
}

async fn fetch(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<IssueView>> {
    let Path(id) = id?;
    Ok(Json(state.library.issues.get(id).await?))
}

async fn issue(
    State(state): State<AppState>,
    payload: Result<Json<NewIssue>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Mutation>)> {
    let Json(new) = payload?;
    let issue = state.library.issues.issue(new).await?;
    Ok(created("Book issued successfully", issue.id))
}

async fn return_issue(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Mutation>> {
    let Path(id) = id?;
    state.library.issues.return_issue(id).await?;
    Ok(done("Book returned successfully"))
}

async fn update_status(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StatusChange>, JsonRejection>,
) -> ApiResult<Json<Mutation>> {
    let Path(id) = id?;
    let Json(change) = payload?;
    state.library.issues.update_status(id, change.status).await?;
    Ok(done("Issue status updated successfully"))
}

async fn remove(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Mutation>> {
    let Path(id) = id?;
    state.library.issues.delete(id).await?;
    Ok(done("Issue deleted successfully"))
}
