use crate::render::RichTextNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: String,
    pub published_at: Option<DateTime<Utc>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    pub id: String,
    pub published_at: Option<DateTime<Utc>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner_url: Option<String>,
    pub content: Vec<ContentBlock>,
}

impl PostDetail {
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id.clone(),
            published_at: self.published_at,
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            author: self.author.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextNode>,
}

/// One section of a post after rich text rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSection {
    pub heading: String,
    pub html: String,
}

/// The cached representation of a detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPost {
    pub id: String,
    pub published_at: Option<DateTime<Utc>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner_url: Option<String>,
    pub reading_time_minutes: u32,
    pub sections: Vec<RenderedSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Unknown ids are fetched, rendered and cached on first request.
    #[default]
    Blocking,
    /// Only prebuilt ids are served.
    Disabled,
}

/// The `[posts]` section of the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PostsConfig {
    pub document_type: String,
    pub page_size: usize,
    pub prerender_count: usize,
    pub fallback: FallbackMode,
    pub words_per_minute: u32,
    pub index_template: String,
    pub post_template: String,
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self {
            document_type: String::from("posts"),
            page_size: 3,
            prerender_count: 3,
            fallback: FallbackMode::Blocking,
            words_per_minute: crate::render::WORDS_PER_MINUTE,
            index_template: String::from("posts_index.html.liquid"),
            post_template: String::from("post_detail.html.liquid"),
        }
    }
}
