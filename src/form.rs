/// Add-form logic shared by the popup and options page
use crate::canonicalize::{canonicalize, strip_scheme};
use crate::error::FormError;

/// What the alias will become, shown while the user types (`m` → `m/`)
pub fn preview_alias(input: &str) -> String {
    strip_scheme(&canonicalize(input))
}

/// Both fields must be filled in before an add is sent
pub fn validate_add(alias: &str, destination: &str) -> Result<(), FormError> {
    if alias.trim().is_empty() {
        return Err(FormError::EmptyAlias);
    }
    if destination.trim().is_empty() {
        return Err(FormError::EmptyDestination);
    }
    Ok(())
}
