#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::cache::{CacheConfig, CacheSettings};
    use crate::error::ContentError;
    use crate::pagination::{PaginationState, merge};
    use crate::render::RichTextNode;
    use crate::source::providers::memory::MemoryContentSource;
    use crate::source::{ContentSource, Cursor, Predicate, QueryOptions, QueryPage};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use std::time::Duration;

    /// Wraps a memory source and counts calls that reach it.
    struct CountingSource {
        inner: MemoryContentSource,
        queries: AtomicUsize,
        fetches: AtomicUsize,
    }

    impl CountingSource {
        fn new(inner: MemoryContentSource) -> Self {
            Self {
                inner,
                queries: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
            }
        }

        fn queries(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentSource for CountingSource {
        async fn query(
            &self,
            predicates: &[Predicate],
            options: QueryOptions,
        ) -> Result<QueryPage, ContentError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.query(predicates, options).await
        }

        async fn get_by_uid(
            &self,
            document_type: &str,
            uid: &str,
        ) -> Result<PostDetail, ContentError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.get_by_uid(document_type, uid).await
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn post(index: usize) -> PostDetail {
        PostDetail {
            id: format!("post-{}", index),
            published_at: Utc.with_ymd_and_hms(2021, 3, index as u32, 12, 0, 0).single(),
            title: format!("Post {}", index),
            subtitle: format!("Subtitle {}", index),
            author: "Ana".to_string(),
            banner_url: Some(format!("https://images.example.com/{}.png", index)),
            content: vec![ContentBlock {
                heading: "Intro".to_string(),
                body: vec![RichTextNode::paragraph("word ".repeat(250))],
            }],
        }
    }

    fn setup(count: usize, config: PostsConfig) -> (Arc<CountingSource>, PageAssembler) {
        let posts = (1..=count).map(post).collect();
        let source = Arc::new(CountingSource::new(MemoryContentSource::with_posts(
            "posts", posts,
        )));
        let cache = Arc::new(PostsCache::new(&CacheSettings::default()));
        let assembler = PageAssembler::new(config, source.clone(), cache);
        (source, assembler)
    }

    fn ids(state: &PaginationState) -> Vec<&str> {
        state.items.iter().map(|item| item.id.as_str()).collect()
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_list_then_load_more_until_exhausted() {
        let (_source, assembler) = setup(7, PostsConfig::default());

        let first = assembler.get_list_page(3).await.unwrap();
        assert_eq!(ids(&first), vec!["post-1", "post-2", "post-3"]);
        let cursor = first.cursor.clone().expect("first page has a cursor");

        let second = assembler.load_more(cursor).await.unwrap();
        assert_eq!(ids(&second), vec!["post-4", "post-5", "post-6"]);
        let cursor = second.cursor.clone().expect("second page has a cursor");

        let third = assembler.load_more(cursor).await.unwrap();
        assert_eq!(ids(&third), vec!["post-7"]);
        assert!(third.cursor.is_none());

        let mut state = first.as_ref().clone();
        for fragment in [second, third] {
            state = merge(
                &state,
                QueryPage {
                    results: fragment.items,
                    next_cursor: fragment.cursor,
                },
            )
            .unwrap();
        }
        let expected: Vec<String> = (1..=7).map(|i| format!("post-{}", i)).collect();
        assert_eq!(ids(&state), expected);
        assert!(!state.has_more());
    }

    #[tokio::test]
    async fn test_load_more_into_accumulates() {
        let (_source, assembler) = setup(7, PostsConfig::default());

        let mut state = assembler.get_list_page(3).await.unwrap().as_ref().clone();
        while state.has_more() {
            state = assembler.load_more_into(&state).await.unwrap();
        }
        assert_eq!(state.len(), 7);

        // Nothing left to load: the state comes back as is.
        let again = assembler.load_more_into(&state).await.unwrap();
        assert_eq!(again, state);
    }

    #[tokio::test]
    async fn test_list_page_is_cached() {
        let (source, assembler) = setup(7, PostsConfig::default());

        assembler.get_list_page(3).await.unwrap();
        assembler.get_list_page(3).await.unwrap();
        assert_eq!(source.queries(), 1);

        // A different page size is a different key.
        assembler.get_list_page(5).await.unwrap();
        assert_eq!(source.queries(), 2);
    }

    #[tokio::test]
    async fn test_load_more_always_hits_source() {
        let (source, assembler) = setup(7, PostsConfig::default());
        let first = assembler.get_list_page(3).await.unwrap();
        let cursor = first.cursor.clone().unwrap();

        assembler.load_more(cursor.clone()).await.unwrap();
        assembler.load_more(cursor).await.unwrap();
        assert_eq!(source.queries(), 3);
    }

    #[tokio::test]
    async fn test_load_more_with_unbounded_page_size() {
        let (_source, assembler) = setup(7, PostsConfig::default());
        let first = assembler.get_list_page(3).await.unwrap();

        let rest = assembler
            .load_more_with(first.cursor.clone().unwrap(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(ids(&rest), vec!["post-4", "post-5", "post-6", "post-7"]);
        assert!(rest.cursor.is_none());
    }

    #[tokio::test]
    async fn test_load_more_rejects_unknown_cursor() {
        let (_source, assembler) = setup(7, PostsConfig::default());
        let result = assembler.load_more(Cursor::from("after:nobody")).await;
        assert!(matches!(result, Err(ContentError::InvalidCursor(_))));
    }

    #[tokio::test]
    async fn test_load_more_into_keeps_state_on_failure() {
        let (_source, assembler) = setup(7, PostsConfig::default());
        let state = PaginationState {
            items: Vec::new(),
            cursor: Some(Cursor::from("bogus")),
        };
        assert!(assembler.load_more_into(&state).await.is_err());
        assert_eq!(state.cursor, Some(Cursor::from("bogus")));
    }

    #[tokio::test]
    async fn test_get_post_renders_detail() {
        let (_source, assembler) = setup(3, PostsConfig::default());

        let rendered = assembler.get_post("post-2").await.unwrap();
        assert_eq!(rendered.title, "Post 2");
        assert_eq!(rendered.author, "Ana");
        assert_eq!(rendered.reading_time_minutes, 2);
        assert_eq!(rendered.sections.len(), 1);
        assert_eq!(rendered.sections[0].heading, "Intro");
        assert!(rendered.sections[0].html.starts_with("<p>word word"));
    }

    #[tokio::test]
    async fn test_get_post_missing_is_not_found() {
        let (source, assembler) = setup(3, PostsConfig::default());

        let result = assembler.get_post("missing").await;
        assert_eq!(result, Err(ContentError::NotFound("missing".to_string())));

        // Not cached: a second request asks the source again.
        let _ = assembler.get_post("missing").await;
        assert_eq!(source.fetches(), 2);
        assert!(!assembler.is_prebuilt("missing").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_post_served_while_regenerating() {
        let (source, assembler) = setup(3, PostsConfig::default());

        let at_zero = assembler.get_post("post-1").await.unwrap();
        assert_eq!(at_zero.title, "Post 1");

        let mut updated = post(1);
        updated.title = "Post 1, revised".to_string();
        source.inner.upsert("posts", updated).await;

        tokio::time::advance(Duration::from_secs(15)).await;

        let at_fifteen = assembler.get_post("post-1").await.unwrap();
        assert_eq!(at_fifteen.title, "Post 1");
        settle().await;
        assert_eq!(source.fetches(), 2);

        let refreshed = assembler.get_post("post-1").await.unwrap();
        assert_eq!(refreshed.title, "Post 1, revised");
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_post_survives_source_removal() {
        let (source, assembler) = setup(3, PostsConfig::default());

        assembler.get_post("post-3").await.unwrap();
        source.inner.remove("post-3").await;
        tokio::time::advance(Duration::from_secs(15)).await;

        let stale = assembler.get_post("post-3").await.unwrap();
        assert_eq!(stale.title, "Post 3");
        settle().await;

        let stats = assembler.stats().await;
        assert_eq!(stats.posts.regeneration_failures, 1);
        assert_eq!(assembler.get_post("post-3").await.unwrap().title, "Post 3");
    }

    #[tokio::test]
    async fn test_prebuild_warms_first_posts() {
        let (source, assembler) = setup(7, PostsConfig::default());

        assert_eq!(assembler.prebuild().await.unwrap(), 3);
        assert_eq!(
            assembler.prebuilt_paths().await,
            vec!["post-1", "post-2", "post-3"]
        );
        assert_eq!(source.fetches(), 3);

        assembler.get_post("post-2").await.unwrap();
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test]
    async fn test_blocking_fallback_builds_on_demand() {
        let (source, assembler) = setup(7, PostsConfig::default());
        assembler.prebuild().await.unwrap();

        let rendered = assembler.get_post("post-6").await.unwrap();
        assert_eq!(rendered.title, "Post 6");
        assert!(assembler.is_prebuilt("post-6").await);

        assembler.get_post("post-6").await.unwrap();
        assert_eq!(source.fetches(), 4);
    }

    #[tokio::test]
    async fn test_disabled_fallback_rejects_unbuilt_posts() {
        let config = PostsConfig {
            fallback: FallbackMode::Disabled,
            ..PostsConfig::default()
        };
        let (source, assembler) = setup(7, config);
        assembler.prebuild().await.unwrap();

        assert!(assembler.get_post("post-1").await.is_ok());
        let result = assembler.get_post("post-6").await;
        assert!(matches!(result, Err(ContentError::NotFound(_))));
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test]
    async fn test_invalidate_post_forces_rebuild() {
        let (source, assembler) = setup(3, PostsConfig::default());

        assembler.get_post("post-1").await.unwrap();
        assert!(assembler.invalidate_post("post-1").await);
        assembler.get_post("post-1").await.unwrap();
        assert_eq!(source.fetches(), 2);

        assembler.get_list_page(3).await.unwrap();
        assert_eq!(assembler.invalidate_lists().await, 1);
        assembler.get_list_page(3).await.unwrap();
        assert_eq!(source.queries(), 2);
    }

    #[tokio::test]
    async fn test_custom_reading_rate() {
        let config = PostsConfig {
            words_per_minute: 100,
            ..PostsConfig::default()
        };
        let (_source, assembler) = setup(1, config);
        let rendered = assembler.get_post("post-1").await.unwrap();
        assert_eq!(rendered.reading_time_minutes, 3);
    }

    #[tokio::test]
    async fn test_short_ttl_store() {
        let posts = vec![post(1)];
        let source: Arc<dyn ContentSource> =
            Arc::new(MemoryContentSource::with_posts("posts", posts));
        let cache = Arc::new(PostsCache::with_configs(
            CacheConfig::default().with_ttl(Duration::from_secs(60)),
            CacheConfig::default().with_ttl(Duration::from_secs(1)),
        ));
        let assembler = PageAssembler::new(PostsConfig::default(), source, cache);

        assembler.get_post("post-1").await.unwrap();
        assembler.get_list_page(3).await.unwrap();
        let stats = assembler.stats().await;
        assert_eq!(stats.posts.entries, 1);
        assert_eq!(stats.lists.entries, 1);
        assert_eq!(assembler.source_name(), "memory");
    }

    #[test]
    fn test_format_date() {
        let date = Utc.with_ymd_and_hms(2021, 3, 5, 19, 25, 0).single();
        assert_eq!(handlers::format_date(date), "05 Mar 2021");
        assert_eq!(handlers::format_date(None), "");
    }

    #[test]
    fn test_post_url_is_encoded() {
        assert_eq!(handlers::post_url("como-utilizar-hooks"), "/post/como-utilizar-hooks");
        assert_eq!(handlers::post_url("a b/c"), "/post/a%20b%2Fc");
    }
}
