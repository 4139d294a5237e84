use super::{RenderedPost, store::PostsCacheStats, types::PostSummary};
use crate::AppState;
use crate::error::ContentError;
use crate::pagination::PaginationState;
use crate::source::Cursor;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Largest page size accepted from a client.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Deserialize)]
pub struct ListQuery {
    page_size: Option<usize>,
}

#[derive(Deserialize)]
pub struct MoreQuery {
    cursor: String,
    page_size: Option<usize>,
}

#[derive(Serialize)]
pub struct RevalidateResponse {
    invalidated: usize,
}

/// Formats a publication date as `dd Mon yyyy`, or an empty string.
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|date| date.format("%d %b %Y").to_string())
        .unwrap_or_default()
}

pub fn post_url(uid: &str) -> String {
    format!("/post/{}", urlencoding::encode(uid))
}

fn page_size_or_default(app_state: &AppState, requested: Option<usize>) -> usize {
    requested
        .unwrap_or(app_state.assembler.get_config().page_size)
        .clamp(1, MAX_PAGE_SIZE)
}

fn summary_object(post: &PostSummary) -> liquid::Object {
    liquid::object!({
        "id": post.id,
        "title": post.title,
        "subtitle": post.subtitle,
        "author": post.author,
        "url": post_url(&post.id),
        "date": post.published_at.map(|date| date.to_rfc3339()).unwrap_or_default(),
        "date_formatted": format_date(post.published_at),
    })
}

fn base_url(app_state: &AppState) -> &str {
    app_state
        .config
        .app
        .base_url
        .as_deref()
        .unwrap_or("http://localhost:3000")
}

pub async fn posts_index_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    let assembler = &app_state.assembler;
    let config = assembler.get_config();

    let state = match assembler.get_list_page(config.page_size).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to build post list: {}", e);
            return (e.status_code(), "Failed to load posts").into_response();
        }
    };

    let posts: Vec<_> = state.items.iter().map(summary_object).collect();
    let next_cursor = state
        .cursor
        .as_ref()
        .map(|cursor| cursor.to_string())
        .unwrap_or_default();

    let base_url = base_url(&app_state);
    let page_title = app_state.config.app.name.clone();
    let meta_description = format!("Latest posts from {}", page_title);

    let globals = liquid::object!({
        "posts": posts,
        "has_more": state.has_more(),
        "next_cursor": next_cursor,
        "page_size": config.page_size,
        "more_url": "/api/posts/more",
        "base_url": base_url,
        "page_title": page_title.clone(),
        "meta_description": meta_description.clone(),
        "og_title": page_title,
        "og_description": meta_description,
        "og_url": format!("{}/", base_url),
        "og_type": "website",
    });

    match app_state
        .template_engine
        .render_template(&config.index_template, globals)
        .await
    {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Template rendering error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

pub async fn post_detail_handler(
    State(app_state): State<AppState>,
    Path(uid): Path<String>,
) -> impl IntoResponse {
    let post = match app_state.assembler.get_post(&uid).await {
        Ok(post) => post,
        Err(ContentError::NotFound(_)) => {
            return (StatusCode::NOT_FOUND, "Post not found").into_response();
        }
        Err(e) => {
            error!("Failed to build post {}: {}", uid, e);
            return (e.status_code(), "Failed to load post").into_response();
        }
    };

    let config = app_state.assembler.get_config();
    let base_url = base_url(&app_state);
    let full_url = format!("{}{}", base_url, post_url(&post.id));

    let sections: Vec<_> = post
        .sections
        .iter()
        .map(|section| {
            liquid::object!({
                "heading": section.heading,
                "html": section.html,
            })
        })
        .collect();

    let published = post
        .published_at
        .map(|date| date.to_rfc3339())
        .unwrap_or_default();

    let globals = liquid::object!({
        "post": {
            "id": post.id,
            "title": post.title,
            "subtitle": post.subtitle,
            "author": post.author,
            "banner_url": post.banner_url.clone().unwrap_or_default(),
            "date": published.clone(),
            "date_formatted": format_date(post.published_at),
            "reading_time": format!("{} min", post.reading_time_minutes),
            "reading_time_minutes": post.reading_time_minutes,
            "sections": sections,
        },
        "base_url": base_url,
        "page_title": post.title,
        "meta_description": post.subtitle,
        "og_title": post.title,
        "og_description": post.subtitle,
        "og_url": full_url,
        "og_type": "article",
        "og_image": post.banner_url.clone().unwrap_or_default(),
        "article_published_time": published,
    });

    match app_state
        .template_engine
        .render_template(&config.post_template, globals)
        .await
    {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Template rendering error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

pub async fn list_posts_api(
    State(app_state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginationState>, ContentError> {
    let page_size = page_size_or_default(&app_state, query.page_size);
    let state = app_state.assembler.get_list_page(page_size).await?;
    Ok(Json(state.as_ref().clone()))
}

pub async fn load_more_api(
    State(app_state): State<AppState>,
    Query(query): Query<MoreQuery>,
) -> Result<Json<PaginationState>, ContentError> {
    if query.cursor.trim().is_empty() {
        return Err(ContentError::InvalidCursor("empty cursor".to_string()));
    }

    let page_size = page_size_or_default(&app_state, query.page_size);
    let fragment = app_state
        .assembler
        .load_more_with(Cursor::new(query.cursor), page_size)
        .await?;
    Ok(Json(fragment))
}

pub async fn post_api(
    State(app_state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<RenderedPost>, ContentError> {
    let post = app_state.assembler.get_post(&uid).await?;
    Ok(Json(post.as_ref().clone()))
}

pub async fn revalidate_post_handler(
    State(app_state): State<AppState>,
    Path(uid): Path<String>,
) -> Json<RevalidateResponse> {
    let invalidated = usize::from(app_state.assembler.invalidate_post(&uid).await);
    info!("Revalidation requested for post {}", uid);
    Json(RevalidateResponse { invalidated })
}

pub async fn revalidate_list_handler(State(app_state): State<AppState>) -> Json<RevalidateResponse> {
    let invalidated = app_state.assembler.invalidate_lists().await;
    info!("Revalidation requested for list pages");
    Json(RevalidateResponse { invalidated })
}

pub async fn cache_stats_handler(State(app_state): State<AppState>) -> Json<PostsCacheStats> {
    Json(app_state.assembler.stats().await)
}
