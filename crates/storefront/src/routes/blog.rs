//! Blog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header::CACHE_CONTROL,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use crate::content::{Post, PostSummary};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Posts change only on deploy.
const BLOG_CACHE: (axum::http::HeaderName, &str) = (CACHE_CONTROL, "public, max-age=300");

#[derive(Debug, Deserialize)]
pub struct BlogQuery {
    pub tag: Option<String>,
}

/// Published posts, newest first, optionally filtered by tag.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<BlogQuery>,
) -> impl IntoResponse {
    let content = state.content();
    let posts: Vec<PostSummary<'_>> = match query.tag.as_deref().filter(|t| !t.is_empty()) {
        Some(tag) => content.posts_by_tag(tag).map(Post::summary).collect(),
        None => content.published_posts().map(Post::summary).collect(),
    };
    ([BLOG_CACHE], Json(posts)).into_response()
}

/// Tags used by published posts.
#[instrument(skip(state))]
pub async fn tags(State(state): State<AppState>) -> impl IntoResponse {
    ([BLOG_CACHE], Json(state.content().tags()))
}

/// A single published post with rendered HTML.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let post = state
        .content()
        .get_post(&slug)
        .ok_or_else(|| AppError::NotFound("Post".to_string()))?;
    Ok(([BLOG_CACHE], Json(post.clone())))
}
