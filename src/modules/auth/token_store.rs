use crate::constants::TOKEN_FILE;
use crate::error::{AppError, AppResult};
use crate::models::{TokenGrant, TokenSet};
use crate::modules::system::paths::get_data_dir;
use std::fs;
use std::path::PathBuf;

/// Persistence of the credential file. Writes go through a temp file plus
/// rename so a crash mid-write never leaves a truncated credential behind.
/// Callers serialize writes through the session refresh gate.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new() -> AppResult<Self> {
        let path = get_data_dir().map_err(AppError::Config)?.join(TOKEN_FILE);
        Ok(Self { path })
    }

    #[cfg(test)]
    pub(crate) fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> AppResult<Option<TokenSet>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let grant: TokenGrant = serde_json::from_str(&content)?;
        Ok(Some(TokenSet::from_grant(grant)))
    }

    pub fn save(&self, grant: &TokenGrant) -> AppResult<()> {
        let content = serde_json::to_string_pretty(grant)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    pub fn delete(&self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::warn!("Failed to delete token file: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant() -> TokenGrant {
        TokenGrant {
            access_token: "access-abc".into(),
            expires_in: 300,
            refresh_expires_in: 1800,
            refresh_token: "refresh-xyz".into(),
            token_type: "Bearer".into(),
            session_state: "s-1".into(),
            scope: "openid offline_access".into(),
        }
    }

    #[test]
    fn round_trip_preserves_tokens_and_expiry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::at(dir.path().join(TOKEN_FILE));

        let original = TokenSet::from_grant(grant());
        store.save(&original.grant).expect("save");
        let loaded = store.load().expect("load").expect("present");

        assert_eq!(loaded.grant.access_token, original.grant.access_token);
        assert_eq!(loaded.grant.refresh_token, original.grant.refresh_token);
        assert_eq!(loaded.grant.session_state, original.grant.session_state);
        let drift = (loaded.expires_at - original.expires_at).num_milliseconds().abs();
        assert!(drift < 1000, "expiry drifted by {}ms", drift);
    }

    #[test]
    fn load_of_missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::at(dir.path().join(TOKEN_FILE));
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::at(dir.path().join(TOKEN_FILE));
        store.save(&grant()).expect("save");
        store.delete();
        store.delete();
        assert!(store.load().expect("load").is_none());
    }
}
