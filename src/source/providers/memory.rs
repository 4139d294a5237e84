use crate::error::ContentError;
use crate::posts::PostDetail;
use crate::source::{ContentSource, Cursor, Predicate, QueryOptions, QueryPage, document};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

const CURSOR_PREFIX: &str = "after:";

/// An in-process content source over an ordered list of documents.
///
/// Cursors resume after a named document, so a cursor whose document has
/// since been removed is rejected as invalid.
pub struct MemoryContentSource {
    documents: RwLock<Vec<StoredDocument>>,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    document_type: String,
    post: PostDetail,
}

impl MemoryContentSource {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
        }
    }

    pub fn with_posts(document_type: &str, posts: Vec<PostDetail>) -> Self {
        let documents = posts
            .into_iter()
            .map(|post| StoredDocument {
                document_type: document_type.to_string(),
                post,
            })
            .collect();
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Loads a JSON array of raw documents.
    pub async fn from_fixture(path: &Path) -> Result<Self, ContentError> {
        info!("Loading content fixture from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&content)?;

        let Value::Array(raw_documents) = value else {
            return Err(ContentError::MalformedPage(format!(
                "fixture {:?} is not a sequence of documents",
                path
            )));
        };

        let mut documents = Vec::with_capacity(raw_documents.len());
        for raw in &raw_documents {
            let document_type = document::document_type(raw)
                .ok_or_else(|| {
                    ContentError::MalformedPage("fixture document has no type".to_string())
                })?
                .to_string();
            let post = document::narrow_detail(raw)?;
            debug!("Loaded fixture document: {}", post.id);
            documents.push(StoredDocument {
                document_type,
                post,
            });
        }

        info!("Loaded {} documents", documents.len());

        Ok(Self {
            documents: RwLock::new(documents),
        })
    }

    /// Replaces the document with the same uid in place, or appends it.
    pub async fn upsert(&self, document_type: &str, post: PostDetail) {
        let mut documents = self.documents.write().await;
        let stored = StoredDocument {
            document_type: document_type.to_string(),
            post,
        };

        match documents.iter_mut().find(|doc| doc.post.id == stored.post.id) {
            Some(existing) => *existing = stored,
            None => documents.push(stored),
        }
    }

    pub async fn remove(&self, uid: &str) -> Option<PostDetail> {
        let mut documents = self.documents.write().await;
        let position = documents.iter().position(|doc| doc.post.id == uid)?;
        Some(documents.remove(position).post)
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl Default for MemoryContentSource {
    fn default() -> Self {
        Self::new()
    }
}

fn predicate_matches(doc: &StoredDocument, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::At { path, value } => {
            if path == "document.type" {
                return doc.document_type == *value;
            }
            if path == "document.uid" {
                return doc.post.id == *value;
            }
            match path
                .strip_prefix("my.")
                .and_then(|rest| rest.strip_suffix(".uid"))
            {
                Some(document_type) => doc.document_type == document_type && doc.post.id == *value,
                None => false,
            }
        }
    }
}

#[async_trait]
impl ContentSource for MemoryContentSource {
    async fn query(
        &self,
        predicates: &[Predicate],
        options: QueryOptions,
    ) -> Result<QueryPage, ContentError> {
        let documents = self.documents.read().await;
        let matching: Vec<&StoredDocument> = documents
            .iter()
            .filter(|doc| predicates.iter().all(|predicate| predicate_matches(doc, predicate)))
            .collect();

        let start = match &options.cursor {
            None => 0,
            Some(cursor) => {
                let after = cursor
                    .as_str()
                    .strip_prefix(CURSOR_PREFIX)
                    .ok_or_else(|| ContentError::InvalidCursor(cursor.to_string()))?;
                matching
                    .iter()
                    .position(|doc| doc.post.id == after)
                    .map(|position| position + 1)
                    .ok_or_else(|| ContentError::InvalidCursor(cursor.to_string()))?
            }
        };

        let end = start
            .saturating_add(options.page_size.max(1))
            .min(matching.len());
        let page = &matching[start..end];

        let next_cursor = match page.last() {
            Some(last) if end < matching.len() => {
                Some(Cursor::new(format!("{}{}", CURSOR_PREFIX, last.post.id)))
            }
            _ => None,
        };

        Ok(QueryPage {
            results: page.iter().map(|doc| doc.post.summary()).collect(),
            next_cursor,
        })
    }

    async fn get_by_uid(
        &self,
        document_type: &str,
        uid: &str,
    ) -> Result<PostDetail, ContentError> {
        let documents = self.documents.read().await;
        documents
            .iter()
            .find(|doc| doc.document_type == document_type && doc.post.id == uid)
            .map(|doc| doc.post.clone())
            .ok_or_else(|| ContentError::NotFound(uid.to_string()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
