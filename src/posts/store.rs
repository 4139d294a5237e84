use super::types::RenderedPost;
use crate::cache::{CacheConfig, CacheSettings, CacheStats, RevalidatingCache};
use crate::pagination::PaginationState;
use serde::Serialize;
use std::sync::Arc;

/// The snapshot store behind a [`super::PageAssembler`], one cache per key
/// class.
///
/// List pages are keyed by page size and detail pages by uid. The store is
/// built once at start-up and handed to the assembler.
pub struct PostsCache {
    pub lists: RevalidatingCache<usize, Arc<PaginationState>>,
    pub posts: RevalidatingCache<String, Arc<RenderedPost>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PostsCacheStats {
    pub lists: CacheStats,
    pub posts: CacheStats,
}

impl PostsCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self::with_configs(settings.list_config(), settings.post_config())
    }

    pub fn with_configs(list_config: CacheConfig, post_config: CacheConfig) -> Self {
        Self {
            lists: RevalidatingCache::new("list", list_config),
            posts: RevalidatingCache::new("post", post_config),
        }
    }

    pub async fn stats(&self) -> PostsCacheStats {
        PostsCacheStats {
            lists: self.lists.stats().await,
            posts: self.posts.stats().await,
        }
    }
}

impl Default for PostsCache {
    fn default() -> Self {
        Self::new(&CacheSettings::default())
    }
}
