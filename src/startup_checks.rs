use crate::Config;
use crate::source::ContentSourceConfig;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Static files directory does not exist: {0}")]
    StaticDirectoryMissing(String),

    #[error("Templates directory does not exist: {0}")]
    TemplatesDirectoryMissing(String),

    #[error("Required template missing: {0}")]
    RequiredTemplateMissing(String),

    #[error("Content fixture is not readable: {0}")]
    FixtureUnreadable(String),

    #[error("Content source endpoint is invalid: {0}")]
    InvalidEndpoint(String),
}

impl StartupCheckError {
    /// Whether the server cannot serve content at all with this problem.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StartupCheckError::FixtureUnreadable(_) | StartupCheckError::InvalidEndpoint(_)
        )
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let static_dir = &config.static_files.directory;
    if !static_dir.exists() {
        warn!("Static files directory does not exist: {:?}", static_dir);
        errors.push(StartupCheckError::StaticDirectoryMissing(
            static_dir.display().to_string(),
        ));
    } else {
        info!("Static files directory exists: {:?}", static_dir);
    }

    let templates_dir = Path::new(&config.templates.directory);
    if !templates_dir.exists() {
        warn!("Templates directory does not exist: {:?}", templates_dir);
        warn!("This may cause issues with page rendering");
        errors.push(StartupCheckError::TemplatesDirectoryMissing(
            templates_dir.display().to_string(),
        ));
    } else {
        info!("Templates directory exists: {:?}", templates_dir);
        for template in [&config.posts.index_template, &config.posts.post_template] {
            if !templates_dir.join(template).exists() {
                warn!("Required template missing: {}", template);
                errors.push(StartupCheckError::RequiredTemplateMissing(template.clone()));
            }
        }
    }

    match &config.source {
        ContentSourceConfig::Memory(memory) => {
            match tokio::fs::metadata(&memory.fixture).await {
                Ok(metadata) if metadata.is_file() => {
                    info!("Content fixture exists: {:?}", memory.fixture)
                }
                Ok(_) => {
                    error!("Content fixture is not a file: {:?}", memory.fixture);
                    errors.push(StartupCheckError::FixtureUnreadable(
                        memory.fixture.display().to_string(),
                    ));
                }
                Err(e) => {
                    error!("Content fixture {:?} is not accessible: {}", memory.fixture, e);
                    errors.push(StartupCheckError::FixtureUnreadable(
                        memory.fixture.display().to_string(),
                    ));
                }
            }
        }
        ContentSourceConfig::Http(http) => match Url::parse(&http.endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
                info!("Content source endpoint: {}", url);
            }
            Ok(_) | Err(_) => {
                error!("Content source endpoint is not an http(s) URL: {}", http.endpoint);
                errors.push(StartupCheckError::InvalidEndpoint(http.endpoint.clone()));
            }
        },
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{HttpSourceConfig, MemorySourceConfig};
    use std::fs;
    use tempfile::TempDir;

    fn config_in(temp_dir: &TempDir) -> Config {
        let root = temp_dir.path();
        let mut config = Config::default();
        config.templates.directory = root.join("templates");
        config.static_files.directory = root.join("static");
        config.source = ContentSourceConfig::Memory(MemorySourceConfig {
            fixture: root.join("posts.json"),
        });
        config
    }

    fn populate(temp_dir: &TempDir) {
        let root = temp_dir.path();
        fs::create_dir(root.join("templates")).unwrap();
        fs::create_dir(root.join("static")).unwrap();
        fs::write(root.join("templates/posts_index.html.liquid"), "").unwrap();
        fs::write(root.join("templates/post_detail.html.liquid"), "").unwrap();
        fs::write(root.join("posts.json"), "[]").unwrap();
    }

    #[tokio::test]
    async fn test_complete_setup_passes() {
        let temp_dir = TempDir::new().unwrap();
        populate(&temp_dir);
        assert!(perform_startup_checks(&config_in(&temp_dir)).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_fixture_is_critical() {
        let temp_dir = TempDir::new().unwrap();
        populate(&temp_dir);
        fs::remove_file(temp_dir.path().join("posts.json")).unwrap();

        let errors = perform_startup_checks(&config_in(&temp_dir))
            .await
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_critical());
    }

    #[tokio::test]
    async fn test_missing_directories_are_not_critical() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("posts.json"), "[]").unwrap();

        let errors = perform_startup_checks(&config_in(&temp_dir))
            .await
            .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| !e.is_critical()));
    }

    #[tokio::test]
    async fn test_endpoint_must_be_http() {
        let temp_dir = TempDir::new().unwrap();
        populate(&temp_dir);

        for (endpoint, ok) in [
            ("https://repo.cdn.prismic.io/api/v2", true),
            ("ftp://repo.cdn.prismic.io/api/v2", false),
            ("not a url", false),
        ] {
            let mut config = config_in(&temp_dir);
            config.source = ContentSourceConfig::Http(HttpSourceConfig {
                endpoint: endpoint.to_string(),
                access_token: None,
                timeout_seconds: 30,
            });
            let result = perform_startup_checks(&config).await;
            assert_eq!(result.is_ok(), ok, "{}", endpoint);
        }
    }
}
