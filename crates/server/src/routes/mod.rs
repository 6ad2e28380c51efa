//! HTTP routes of the lending API, all mounted under `/api`.
mod authors;
mod books;
mod issues;

use crate::state::AppState;
use axum::http::StatusCode;
use axum::{Json, Router};
use serde::Serialize;

/// Response body of every write request.
#[derive(Serialize, Debug)]
pub struct Mutation {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
}

fn created(message: &'static str, id: Option<i64>) -> (StatusCode, Json<Mutation>) {
    (StatusCode::CREATED, Json(Mutation { message, id }))
}

const fn done(message: &'static str) -> Json<Mutation> {
    Json(Mutation { message, id: None })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(authors::router())
        .merge(books::router())
        .merge(issues::router())
        .with_state(state)
}
