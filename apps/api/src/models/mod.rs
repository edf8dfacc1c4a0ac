// Types shared across the domain modules.

pub mod user;

use serde::{Deserialize, Serialize};

/// A file reference attached to a task or journal entry. Blob upload happens elsewhere;
/// only the metadata is stored on the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Trims a required text field, rejecting blank values.
pub fn required_text(value: &str, field: &str) -> Result<String, crate::errors::AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::errors::AppError::validation(format!(
            "{field} cannot be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trims tags and drops blanks and repeats, keeping first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}
