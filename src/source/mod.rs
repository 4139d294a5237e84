pub mod config;
pub mod document;
pub mod providers;

pub use config::*;

use crate::error::ContentError;
use crate::posts::{PostDetail, PostSummary};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque continuation token handed out by a content source.
///
/// Consumers pass it back verbatim and never look inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `path` equals `value`, e.g. `document.type` = `posts`.
    At { path: String, value: String },
}

impl Predicate {
    pub fn at(path: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::At {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn document_type(document_type: &str) -> Self {
        Self::at("document.type", document_type)
    }

    pub fn uid(document_type: &str, uid: &str) -> Self {
        Self::at(format!("my.{}.uid", document_type), uid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub page_size: usize,
    pub cursor: Option<Cursor>,
}

impl QueryOptions {
    pub fn first_page(page_size: usize) -> Self {
        Self {
            page_size,
            cursor: None,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    pub results: Vec<PostSummary>,
    pub next_cursor: Option<Cursor>,
}

/// The remote query API posts come from.
///
/// Implementations narrow raw payloads into [`PostSummary`] and
/// [`PostDetail`] before returning them.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Runs a query. With `options.cursor` set, continues from the page that
    /// handed the cursor out; an unrecognised cursor is `InvalidCursor`.
    async fn query(
        &self,
        predicates: &[Predicate],
        options: QueryOptions,
    ) -> Result<QueryPage, ContentError>;

    async fn get_by_uid(&self, document_type: &str, uid: &str)
    -> Result<PostDetail, ContentError>;

    fn name(&self) -> &str;
}

pub type DynContentSource = Arc<dyn ContentSource>;

pub async fn create_source(config: &ContentSourceConfig) -> Result<DynContentSource, ContentError> {
    match config {
        ContentSourceConfig::Http(http_config) => Ok(Arc::new(
            providers::http::HttpContentSource::new(http_config)?,
        )),
        ContentSourceConfig::Memory(memory_config) => Ok(Arc::new(
            providers::memory::MemoryContentSource::from_fixture(&memory_config.fixture).await?,
        )),
    }
}
