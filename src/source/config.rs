use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ContentSourceConfig {
    Http(HttpSourceConfig),
    Memory(MemorySourceConfig),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSourceConfig {
    /// API root, e.g. `https://your-repo.cdn.prismic.io/api/v2`.
    pub endpoint: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemorySourceConfig {
    /// JSON array of raw documents.
    pub fixture: PathBuf,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for ContentSourceConfig {
    fn default() -> Self {
        ContentSourceConfig::Memory(MemorySourceConfig {
            fixture: PathBuf::from("content/posts.json"),
        })
    }
}
