//! Cursor-based pagination state for list views.
//!
//! A [`PaginationState`] is an owned value: the view that displays a list
//! keeps one, and every "load more" produces a new state through [`merge`].

use crate::error::ContentError;
use crate::posts::PostSummary;
use crate::source::{Cursor, QueryPage};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginationState {
    #[serde(rename = "results")]
    pub items: Vec<PostSummary>,
    #[serde(rename = "nextCursor")]
    pub cursor: Option<Cursor>,
}

impl PaginationState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A state holding just one fetched page.
    pub fn from_page(page: QueryPage) -> Result<Self, ContentError> {
        merge(&Self::empty(), page)
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Appends a fetched page to `existing`, skipping ids already present.
///
/// Existing items keep their order and new items follow in source order. The
/// cursor is always replaced by the page's `next_cursor`, so re-applying the
/// same page only moves the cursor.
pub fn merge(existing: &PaginationState, fetched: QueryPage) -> Result<PaginationState, ContentError> {
    validate_page(&fetched)?;

    let mut seen: HashSet<&str> = existing.items.iter().map(|item| item.id.as_str()).collect();
    let mut appended = Vec::with_capacity(fetched.results.len());

    for item in &fetched.results {
        if seen.insert(item.id.as_str()) {
            appended.push(item.clone());
        }
    }

    let mut items = Vec::with_capacity(existing.items.len() + appended.len());
    items.extend(existing.items.iter().cloned());
    items.extend(appended);

    Ok(PaginationState {
        items,
        cursor: fetched.next_cursor,
    })
}

fn validate_page(page: &QueryPage) -> Result<(), ContentError> {
    if let Some(position) = page.results.iter().position(|item| item.id.trim().is_empty()) {
        return Err(ContentError::MalformedPage(format!(
            "result {} has no id",
            position
        )));
    }
    Ok(())
}
