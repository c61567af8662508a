use std::path::{Path, PathBuf};

use thiserror::Error;

pub(crate) const SPRITE_DIR: &str = "sprites";
pub(crate) const SPRITE_EXTENSION: &str = "png";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceKeyError {
    #[error("resource key must not be empty")]
    Empty,
    #[error("resource key must not start with '/'")]
    LeadingSlash,
    #[error("resource key must not end with '/'")]
    TrailingSlash,
    #[error("resource key must not contain '\\\\'")]
    Backslash,
    #[error("resource key must not contain '..'")]
    ParentTraversal,
    #[error("resource key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

pub(crate) fn validate_resource_key(key: &str) -> Result<(), ResourceKeyError> {
    if key.is_empty() {
        return Err(ResourceKeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(ResourceKeyError::LeadingSlash);
    }
    if key.ends_with('/') {
        return Err(ResourceKeyError::TrailingSlash);
    }
    if key.contains('\\') {
        return Err(ResourceKeyError::Backslash);
    }
    if key.contains("..") {
        return Err(ResourceKeyError::ParentTraversal);
    }
    match key
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '/' | '-')))
    {
        Some(character) => Err(ResourceKeyError::InvalidCharacter { character }),
        None => Ok(()),
    }
}

/// `player/idle` resolves to `<asset_root>/sprites/player/idle.png`.
pub(crate) fn sprite_path_for_key(asset_root: &Path, key: &str) -> Result<PathBuf, ResourceKeyError> {
    validate_resource_key(key)?;
    Ok(asset_root
        .join(SPRITE_DIR)
        .join(format!("{key}.{SPRITE_EXTENSION}")))
}
