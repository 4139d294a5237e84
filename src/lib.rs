use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod cache;
pub mod error;
pub mod pagination;
pub mod posts;
pub mod render;
pub mod source;
pub mod startup_checks;
pub mod templating;


use cache::CacheSettings;
use posts::PostsConfig;
use source::ContentSourceConfig;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub templates: TemplateConfig,
    pub static_files: StaticConfig,
    #[serde(default)]
    pub source: ContentSourceConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub posts: PostsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticConfig {
    pub directory: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            app: AppConfig {
                name: "spacetraveling".to_string(),
                base_url: None,
            },
            templates: TemplateConfig {
                directory: PathBuf::from("templates"),
            },
            static_files: StaticConfig {
                directory: PathBuf::from("static"),
            },
            source: ContentSourceConfig::default(),
            cache: CacheSettings::default(),
            posts: PostsConfig::default(),
        }
    }
}

use axum::{Router, routing::get, routing::post};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub template_engine: Arc<templating::TemplateEngine>,
    pub assembler: Arc<posts::PageAssembler>,
    pub config: Config,
}

pub async fn create_app(config: Config, assembler: Arc<posts::PageAssembler>) -> Router {
    let template_engine = Arc::new(templating::TemplateEngine::new(
        config.templates.directory.clone(),
    ));

    let static_service = ServeDir::new(config.static_files.directory.clone());

    let app_state = AppState {
        template_engine,
        assembler,
        config: config.clone(),
    };

    Router::new()
        .route("/", get(posts::handlers::posts_index_handler))
        .route("/post/{uid}", get(posts::handlers::post_detail_handler))
        .route("/api/posts", get(posts::handlers::list_posts_api))
        .route("/api/posts/more", get(posts::handlers::load_more_api))
        .route("/api/posts/{uid}", get(posts::handlers::post_api))
        .route(
            "/api/revalidate/posts/{uid}",
            post(posts::handlers::revalidate_post_handler),
        )
        .route(
            "/api/revalidate/list",
            post(posts::handlers::revalidate_list_handler),
        )
        .route("/api/cache/stats", get(posts::handlers::cache_stats_handler))
        .nest_service("/static", static_service)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let method = request.method();
                    let uri = request.uri();
                    let user_agent = request
                        .headers()
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %method,
                        path = %uri.path(),
                        query = ?uri.query(),
                        user_agent = %user_agent,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}
