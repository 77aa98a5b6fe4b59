/// API route modules
pub mod download;
pub mod health;
pub mod playlist;
pub mod search;

use crate::error::{Result, ServerError};

/// Trimmed, non-empty locator that cannot be mistaken for a tool option
pub(crate) fn required_locator(url: Option<&str>) -> Result<&str> {
    let locator = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ServerError::BadRequest("url is required".to_string()))?;

    if locator.starts_with('-') {
        return Err(ServerError::BadRequest(
            "url must not start with '-'".to_string(),
        ));
    }
    Ok(locator)
}
