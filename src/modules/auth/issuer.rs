use crate::error::{AppError, AppResult};
use crate::models::TokenGrant;
use crate::utils::http::get_long_client;

/// Exchange point for credentials. The token endpoint is a black box to the
/// rest of the crate; tests substitute their own issuer. Futures are Send so
/// the session renewal task can run on the runtime's worker threads.
pub trait CredentialIssuer: Send + Sync + 'static {
    fn password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = AppResult<TokenGrant>> + Send;
    fn refresh_grant(
        &self,
        refresh_token: &str,
    ) -> impl std::future::Future<Output = AppResult<TokenGrant>> + Send;
    fn revoke(&self, token: &str) -> impl std::future::Future<Output = AppResult<()>> + Send;
}

/// OpenID-Connect token issuer (Keycloak-style realm endpoints).
pub struct OpenIdIssuer {
    base_url: String,
    realm: String,
    client_id: String,
}

impl OpenIdIssuer {
    pub fn new(base_url: impl Into<String>, realm: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            realm: realm.into(),
            client_id: client_id.into(),
        }
    }

    fn token_endpoint(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url, self.realm
        )
    }

    fn revoke_endpoint(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/revoke",
            self.base_url, self.realm
        )
    }

    async fn send_token_request(&self, params: &[(&str, &str)]) -> AppResult<TokenGrant> {
        let response = get_long_client()
            .post(self.token_endpoint())
            .header("Accept", "application/json")
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let grant = response.json::<TokenGrant>().await.map_err(|e| AppError::Api {
                status: Some(status.as_u16()),
                detail: format!("token response parsing failed: {}", e),
            })?;
            tracing::info!("Token grant received, expires in {}s", grant.expires_in);
            Ok(grant)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AppError::api(
                status.as_u16(),
                format!("token request failed: {}", body),
            ))
        }
    }
}

impl CredentialIssuer for OpenIdIssuer {
    async fn password_grant(&self, username: &str, password: &str) -> AppResult<TokenGrant> {
        self.send_token_request(&[
            ("grant_type", "password"),
            ("client_id", &self.client_id),
            ("username", username),
            ("password", password),
            ("scope", "openid offline_access"),
        ])
        .await
    }

    async fn refresh_grant(&self, refresh_token: &str) -> AppResult<TokenGrant> {
        self.send_token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", &self.client_id),
            ("refresh_token", refresh_token),
            ("scope", "openid offline_access"),
        ])
        .await
    }

    async fn revoke(&self, token: &str) -> AppResult<()> {
        let response = get_long_client()
            .post(self.revoke_endpoint())
            .form(&[("client_id", self.client_id.as_str()), ("token", token)])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AppError::api(
                status.as_u16(),
                format!("token revocation failed: {}", body),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_follow_realm_layout() {
        let issuer = OpenIdIssuer::new("https://id.example.com", "drafthud", "default-client");
        assert_eq!(
            issuer.token_endpoint(),
            "https://id.example.com/realms/drafthud/protocol/openid-connect/token"
        );
        assert_eq!(
            issuer.revoke_endpoint(),
            "https://id.example.com/realms/drafthud/protocol/openid-connect/revoke"
        );
    }
}
