use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Key under which the identity is persisted
pub const USER_ID_KEY: &str = "chatbot_user_id";

const USER_ID_PREFIX: &str = "user_";
const USER_ID_SUFFIX_LEN: usize = 10;

/// Stable per-profile identifier the backend uses to group history.
///
/// Loaded once at startup and passed to the client explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity(String);

impl UserIdentity {
    /// Read the persisted identity from `dir`, creating and storing a fresh one
    /// if none exists yet. An existing value is never rewritten.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let path = dir.join(USER_ID_KEY);

        if path.exists() {
            let content = fs::read_to_string(&path)
                .context("Failed to read user id")?;
            let id = content.trim();
            if !id.is_empty() {
                return Ok(Self(id.to_string()));
            }
        }

        fs::create_dir_all(dir)
            .context("Failed to create identity directory")?;

        let identity = Self::generate();
        fs::write(&path, identity.as_str())
            .context("Failed to write user id")?;
        tracing::info!(user_id = %identity, "Created new user identity");

        Ok(identity)
    }

    /// `user_` followed by ten lowercase alphanumerics
    pub fn generate() -> Self {
        let random = uuid::Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}{}",
            USER_ID_PREFIX,
            &random[..USER_ID_SUFFIX_LEN]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_shape() {
        let id = UserIdentity::generate();
        let suffix = id.as_str().strip_prefix("user_").unwrap();
        assert_eq!(suffix.len(), 10);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_created_once_then_reused() {
        let dir = tempfile::tempdir().unwrap();
        let first = UserIdentity::load_or_create(dir.path()).unwrap();
        let second = UserIdentity::load_or_create(dir.path()).unwrap();
        assert_eq!(first, second);

        let stored = fs::read_to_string(dir.path().join(USER_ID_KEY)).unwrap();
        assert_eq!(stored, first.as_str());
    }

    #[test]
    fn test_existing_value_is_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(USER_ID_KEY), "user_abc123\n").unwrap();
        let id = UserIdentity::load_or_create(dir.path()).unwrap();
        assert_eq!(id.as_str(), "user_abc123");
    }

    #[test]
    fn test_blank_file_gets_replaced() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(USER_ID_KEY), "   ").unwrap();
        let id = UserIdentity::load_or_create(dir.path()).unwrap();
        assert!(id.as_str().starts_with("user_"));
    }
}
