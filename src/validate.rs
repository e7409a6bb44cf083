use serde_json::Value as JsonValue;
use url::Url;

use crate::model::{BookmarkPatch, CreateBookmark, NewBookmark, UpdateBookmark};

/// First validation failure for a payload. `message` is what the caller
/// sends back verbatim, so the texts here are part of the API contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn required(field: &'static str) -> Self {
        ValidationError {
            field,
            message: format!("'{}' is required", field),
        }
    }

    fn bad_rating() -> Self {
        ValidationError {
            field: "rating",
            message: "'rating' must be a number between 0 and 5".to_string(),
        }
    }

    fn bad_url() -> Self {
        ValidationError {
            field: "url",
            message: "'url' must be a valid url".to_string(),
        }
    }

    fn no_fields() -> Self {
        ValidationError {
            field: "body",
            message: "Request body must contain either 'title', 'url', or 'rating'".to_string(),
        }
    }
}

/// Validates a create payload. Checks run in a fixed sequence so the first
/// failing field is deterministic: presence of title, url, rating (in that
/// order), then rating format/range, then url format.
pub fn validate_create(payload: &CreateBookmark) -> Result<NewBookmark, ValidationError> {
    let title = match payload.title.as_deref() {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return Err(ValidationError::required("title")),
    };

    let url = match payload.url.as_deref() {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => return Err(ValidationError::required("url")),
    };

    let rating_raw = match &payload.rating {
        Some(r) => r,
        None => return Err(ValidationError::required("rating")),
    };

    let rating = check_rating(rating_raw)?;
    check_url(&url)?;

    Ok(NewBookmark {
        title,
        url,
        description: payload.description.clone().unwrap_or_default(),
        rating,
    })
}

/// Validates a partial update. The payload must carry at least one
/// recognized field; supplied fields go through the same rating/url checks
/// as create, and an empty title or url is rejected so the non-empty
/// invariant holds for every persisted record.
pub fn validate_update(payload: &UpdateBookmark) -> Result<BookmarkPatch, ValidationError> {
    if payload.title.is_none()
        && payload.url.is_none()
        && payload.description.is_none()
        && payload.rating.is_none()
    {
        return Err(ValidationError::no_fields());
    }

    if let Some(title) = payload.title.as_deref() {
        if title.is_empty() {
            return Err(ValidationError::required("title"));
        }
    }

    if let Some(url) = payload.url.as_deref() {
        if url.is_empty() {
            return Err(ValidationError::required("url"));
        }
    }

    let rating = match &payload.rating {
        Some(raw) => Some(check_rating(raw)?),
        None => None,
    };

    if let Some(url) = payload.url.as_deref() {
        check_url(url)?;
    }

    Ok(BookmarkPatch {
        title: payload.title.clone(),
        url: payload.url.clone(),
        description: payload.description.clone(),
        rating,
    })
}

/// Coerces a JSON rating value to an integer in [0, 5]. Integral numbers
/// and numeric strings are accepted, matching the original service's
/// loose number coercion.
fn check_rating(raw: &JsonValue) -> Result<i64, ValidationError> {
    let rating = match raw {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0) {
                f as i64
            } else {
                return Err(ValidationError::bad_rating());
            }
        }
        JsonValue::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
            _ => return Err(ValidationError::bad_rating()),
        },
        _ => return Err(ValidationError::bad_rating()),
    };

    if (0..=5).contains(&rating) {
        Ok(rating)
    } else {
        Err(ValidationError::bad_rating())
    }
}

fn check_url(url: &str) -> Result<(), ValidationError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(ValidationError::bad_url()),
    }
}
