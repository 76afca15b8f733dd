use serde::{Deserialize, Serialize};

/// Credential pair as issued by the token endpoint and persisted verbatim
/// to the local token file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_expires_in: i64,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub session_state: String,
    #[serde(default)]
    pub scope: String,
}

/// In-memory credential: the grant plus the expiry instant derived when the
/// grant was received or loaded from disk.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub grant: TokenGrant,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl TokenSet {
    pub fn from_grant(grant: TokenGrant) -> Self {
        let expires_at = chrono::Utc::now() + chrono::Duration::seconds(grant.expires_in);
        Self { grant, expires_at }
    }

    pub fn access_token(&self) -> &str {
        &self.grant.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.grant.refresh_token
    }

    /// True when the access token expires within `margin_secs` from now.
    pub fn is_expiring_within(&self, margin_secs: i64) -> bool {
        chrono::Utc::now() + chrono::Duration::seconds(margin_secs) >= self.expires_at
    }

    #[cfg(test)]
    pub(crate) fn expiring_in_for_tests(grant: TokenGrant, secs_from_now: i64) -> Self {
        Self {
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(secs_from_now),
            grant,
        }
    }
}
