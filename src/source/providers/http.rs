use crate::error::ContentError;
use crate::posts::PostDetail;
use crate::source::{
    ContentSource, Cursor, HttpSourceConfig, Predicate, QueryOptions, QueryPage, document,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Client for a Prismic-style REST API.
///
/// Every query first resolves the repository's master ref from the API root,
/// then searches `documents/search`. The `next_page` URL of a response is
/// handed out verbatim as the cursor.
pub struct HttpContentSource {
    client: Client,
    endpoint: Url,
    search_url: Url,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct ApiInfo {
    refs: Vec<ApiRef>,
}

#[derive(Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

impl HttpContentSource {
    pub fn new(config: &HttpSourceConfig) -> Result<Self, ContentError> {
        let endpoint = Url::parse(config.endpoint.trim_end_matches('/')).map_err(|e| {
            ContentError::SourceUnavailable(format!(
                "invalid endpoint {}: {}",
                config.endpoint, e
            ))
        })?;

        let search_url = Url::parse(&format!(
            "{}/documents/search",
            endpoint.as_str().trim_end_matches('/')
        ))
        .map_err(|e| ContentError::SourceUnavailable(format!("invalid search url: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("spacetraveling/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            search_url,
            access_token: config.access_token.clone(),
        })
    }

    async fn master_ref(&self) -> Result<String, ContentError> {
        let mut url = self.endpoint.clone();
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::SourceUnavailable(format!(
                "API root returned {}",
                status
            )));
        }

        let api: ApiInfo = response.json().await?;
        api.refs
            .into_iter()
            .find(|api_ref| api_ref.is_master_ref)
            .map(|api_ref| api_ref.reference)
            .ok_or_else(|| ContentError::MalformedPage("API has no master ref".to_string()))
    }

    fn search_url_for(&self, reference: &str, predicates: &[Predicate], page_size: usize) -> Url {
        let mut url = self.search_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ref", reference);
            if !predicates.is_empty() {
                pairs.append_pair("q", &format_predicates(predicates));
            }
            pairs.append_pair("pageSize", &page_size.to_string());
            if let Some(token) = &self.access_token {
                pairs.append_pair("access_token", token);
            }
        }
        url
    }

    /// Accepts only cursors that point back at this API's search endpoint.
    fn cursor_url(&self, cursor: &Cursor) -> Result<Url, ContentError> {
        let mut url = Url::parse(cursor.as_str())
            .map_err(|_| ContentError::InvalidCursor(cursor.to_string()))?;

        if url.scheme() != self.search_url.scheme()
            || url.host_str() != self.search_url.host_str()
            || url.port_or_known_default() != self.search_url.port_or_known_default()
            || url.path() != self.search_url.path()
        {
            return Err(ContentError::InvalidCursor(cursor.to_string()));
        }

        if let Some(token) = &self.access_token
            && !url.query_pairs().any(|(key, _)| key == "access_token")
        {
            url.query_pairs_mut().append_pair("access_token", token);
        }

        Ok(url)
    }

    async fn fetch_page(&self, url: Url, from_cursor: bool) -> Result<QueryPage, ContentError> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if from_cursor && status.is_client_error() {
            return Err(ContentError::InvalidCursor(format!(
                "source rejected cursor with {}",
                status
            )));
        }

        if !status.is_success() {
            return Err(ContentError::SourceUnavailable(format!(
                "search returned {}",
                status
            )));
        }

        let value: Value = response.json().await?;
        let raw = document::narrow_search_page(value)?;

        let results = raw
            .results
            .iter()
            .map(document::narrow_summary)
            .collect::<Result<Vec<_>, _>>()?;

        info!("Fetched {} documents", results.len());

        Ok(QueryPage {
            results,
            next_cursor: raw.next_page.map(Cursor::from),
        })
    }
}

/// Renders predicates in the query language, e.g.
/// `[[at(document.type, "posts")]]`.
fn format_predicates(predicates: &[Predicate]) -> String {
    let inner: String = predicates
        .iter()
        .map(|predicate| match predicate {
            Predicate::At { path, value } => {
                format!("[at({}, {})]", path, Value::from(value.as_str()))
            }
        })
        .collect();
    format!("[{}]", inner)
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn query(
        &self,
        predicates: &[Predicate],
        options: QueryOptions,
    ) -> Result<QueryPage, ContentError> {
        match &options.cursor {
            Some(cursor) => {
                let url = self.cursor_url(cursor)?;
                self.fetch_page(url, true).await
            }
            None => {
                let reference = self.master_ref().await?;
                let url = self.search_url_for(&reference, predicates, options.page_size);
                self.fetch_page(url, false).await
            }
        }
    }

    async fn get_by_uid(
        &self,
        document_type: &str,
        uid: &str,
    ) -> Result<PostDetail, ContentError> {
        let reference = self.master_ref().await?;
        let predicates = [
            Predicate::document_type(document_type),
            Predicate::uid(document_type, uid),
        ];
        let url = self.search_url_for(&reference, &predicates, 1);

        debug!("Fetching document {} from {}", uid, url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ContentError::NotFound(uid.to_string()));
        }
        if !status.is_success() {
            return Err(ContentError::SourceUnavailable(format!(
                "search returned {}",
                status
            )));
        }

        let value: Value = response.json().await?;
        let raw = document::narrow_search_page(value)?;
        match raw.results.first() {
            Some(document) => document::narrow_detail(document),
            None => Err(ContentError::NotFound(uid.to_string())),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(endpoint: &str, token: Option<&str>) -> HttpContentSource {
        HttpContentSource::new(&HttpSourceConfig {
            endpoint: endpoint.to_string(),
            access_token: token.map(str::to_string),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_format_predicates() {
        let q = format_predicates(&[
            Predicate::document_type("posts"),
            Predicate::uid("posts", "say \"hi\""),
        ]);
        assert_eq!(
            q,
            r#"[[at(document.type, "posts")][at(my.posts.uid, "say \"hi\"")]]"#
        );
    }

    #[test]
    fn test_search_url_carries_query() {
        let source = source("https://repo.cdn.prismic.io/api/v2/", Some("secret"));
        let url = source.search_url_for("master", &[Predicate::document_type("posts")], 3);
        assert_eq!(url.path(), "/api/v2/documents/search");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("ref".to_string(), "master".to_string())));
        assert!(pairs.contains(&("pageSize".to_string(), "3".to_string())));
        assert!(pairs.contains(&("access_token".to_string(), "secret".to_string())));
        assert!(pairs.contains(&(
            "q".to_string(),
            r#"[[at(document.type, "posts")]]"#.to_string()
        )));
    }

    #[test]
    fn test_cursor_must_point_at_search_endpoint() {
        let source = source("https://repo.cdn.prismic.io/api/v2", None);

        let ok = source.cursor_url(&Cursor::from(
            "https://repo.cdn.prismic.io/api/v2/documents/search?ref=x&page=2",
        ));
        assert!(ok.is_ok());

        for bad in [
            "not a url",
            "https://evil.example.com/api/v2/documents/search?page=2",
            "http://repo.cdn.prismic.io/api/v2/documents/search?page=2",
            "https://repo.cdn.prismic.io/api/v2/other?page=2",
        ] {
            assert!(
                matches!(
                    source.cursor_url(&Cursor::from(bad)),
                    Err(ContentError::InvalidCursor(_))
                ),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_cursor_gains_access_token() {
        let source = source("https://repo.cdn.prismic.io/api/v2", Some("secret"));
        let url = source
            .cursor_url(&Cursor::from(
                "https://repo.cdn.prismic.io/api/v2/documents/search?page=2",
            ))
            .unwrap();
        assert!(url.query().unwrap().contains("access_token=secret"));
    }
}
