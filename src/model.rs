use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bookmark {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub description: String,
    pub rating: i64,
}

/// Raw create payload, before validation. `rating` stays a JSON value so a
/// non-numeric rating reaches the validator and gets the rating-specific
/// error instead of failing body extraction.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CreateBookmark {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub rating: Option<JsonValue>,
}

/// Raw partial-update payload. Unrecognized fields are dropped by serde.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateBookmark {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub rating: Option<JsonValue>,
}

/// Normalized output of create validation, ready for insertion.
#[derive(Debug, Clone)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub description: String,
    pub rating: i64,
}

/// Normalized output of update validation. Only the fields that were
/// supplied are `Some`; the store applies exactly those.
#[derive(Debug, Clone, Default)]
pub struct BookmarkPatch {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub rating: Option<i64>,
}

impl BookmarkPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.url.is_none()
            && self.description.is_none()
            && self.rating.is_none()
    }
}
