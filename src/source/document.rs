//! Narrowing of raw source payloads into the strict post types.
//!
//! Raw documents look like
//!
//! ```json
//! {
//!   "uid": "como-utilizar-hooks",
//!   "type": "posts",
//!   "first_publication_date": "2021-03-15T19:25:28+0000",
//!   "data": {
//!     "title": "Como utilizar Hooks",
//!     "subtitle": "Pensando em sincronização em vez de ciclos de vida",
//!     "author": "Joseph Oliveira",
//!     "banner": { "url": "https://images.prismic.io/..." },
//!     "content": [{ "heading": "Proin et varius", "body": [ ... ] }]
//!   }
//! }
//! ```
//!
//! `uid` and `data.title` are required. Everything else is optional and
//! unknown fields are ignored.

use crate::error::ContentError;
use crate::posts::{ContentBlock, PostDetail, PostSummary};
use crate::render::{self, RichTextNode};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

/// The parts of a search response the rest of the crate relies on.
#[derive(Debug)]
pub struct RawSearchPage {
    pub results: Vec<Value>,
    pub next_page: Option<String>,
}

pub fn narrow_search_page(value: Value) -> Result<RawSearchPage, ContentError> {
    let Value::Object(mut object) = value else {
        return Err(ContentError::MalformedPage(
            "search response is not an object".to_string(),
        ));
    };

    let results = match object.remove("results") {
        Some(Value::Array(results)) => results,
        Some(_) => {
            return Err(ContentError::MalformedPage(
                "results is not a sequence".to_string(),
            ));
        }
        None => {
            return Err(ContentError::MalformedPage(
                "search response has no results".to_string(),
            ));
        }
    };

    let next_page = match object.remove("next_page") {
        Some(Value::String(next)) if !next.is_empty() => Some(next),
        _ => None,
    };

    Ok(RawSearchPage { results, next_page })
}

pub fn document_type(raw: &Value) -> Option<&str> {
    raw.get("type").and_then(Value::as_str)
}

pub fn narrow_summary(raw: &Value) -> Result<PostSummary, ContentError> {
    let id = required_uid(raw)?;
    let data = raw.get("data").unwrap_or(&Value::Null);

    Ok(PostSummary {
        title: required_title(data, &id)?,
        subtitle: text_field(data.get("subtitle")).unwrap_or_default(),
        author: text_field(data.get("author")).unwrap_or_default(),
        published_at: publication_date(raw),
        id,
    })
}

pub fn narrow_detail(raw: &Value) -> Result<PostDetail, ContentError> {
    let summary = narrow_summary(raw)?;
    let data = raw.get("data").unwrap_or(&Value::Null);

    let banner_url = data
        .get("banner")
        .and_then(|banner| banner.get("url"))
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string);

    let content = match data.get("content") {
        Some(Value::Array(blocks)) => blocks.iter().map(narrow_block).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            return Err(ContentError::MalformedPage(format!(
                "content of {} is not a sequence",
                summary.id
            )));
        }
    };

    Ok(PostDetail {
        id: summary.id,
        published_at: summary.published_at,
        title: summary.title,
        subtitle: summary.subtitle,
        author: summary.author,
        banner_url,
        content,
    })
}

fn narrow_block(raw: &Value) -> ContentBlock {
    let heading = text_field(raw.get("heading")).unwrap_or_default();
    let body = match raw.get("body") {
        Some(Value::Array(nodes)) => nodes.iter().cloned().map(RichTextNode::from_value).collect(),
        _ => Vec::new(),
    };
    ContentBlock { heading, body }
}

fn required_uid(raw: &Value) -> Result<String, ContentError> {
    match raw.get("uid").and_then(Value::as_str) {
        Some(uid) if !uid.trim().is_empty() => Ok(uid.to_string()),
        _ => {
            let hint = raw
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("<unknown>");
            Err(ContentError::MalformedPage(format!(
                "document {} has no uid",
                hint
            )))
        }
    }
}

fn required_title(data: &Value, id: &str) -> Result<String, ContentError> {
    text_field(data.get("title"))
        .ok_or_else(|| ContentError::MalformedPage(format!("document {} has no title", id)))
}

/// Reads a key text field, or the plain text of a rich text field.
fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Array(nodes) => {
            let nodes: Vec<RichTextNode> = nodes.iter().cloned().map(RichTextNode::from_value).collect();
            Some(render::to_plain_text(&nodes))
        }
        _ => None,
    }
}

fn publication_date(raw: &Value) -> Option<DateTime<Utc>> {
    raw.get("first_publication_date")
        .and_then(Value::as_str)
        .and_then(parse_date)
}

pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(date_str) {
        return Some(date.with_timezone(&Utc));
    }

    if let Ok(date) = DateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(date.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}
