use crate::utils::http::get_client;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Valid,
    /// Covers explicit rejection (401/403), indeterminate statuses and
    /// network failures alike; every invalid outcome routes to a refresh.
    Invalid,
}

/// Remote check that an access token is still honored by the API.
pub trait SessionProbe: Send + Sync + 'static {
    fn validate(
        &self,
        access_token: &str,
    ) -> impl std::future::Future<Output = ProbeOutcome> + Send;
}

pub struct HttpSessionProbe {
    base_url: String,
}

impl HttpSessionProbe {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl SessionProbe for HttpSessionProbe {
    async fn validate(&self, access_token: &str) -> ProbeOutcome {
        if access_token.is_empty() {
            return ProbeOutcome::Invalid;
        }
        let url = format!("{}/user/session", self.base_url);
        match get_client().get(&url).bearer_auth(access_token).send().await {
            Ok(response) => {
                let status = response.status();
                // 401/403 is the expected shape of "token no longer valid",
                // not an error condition worth more than a debug line.
                if status.as_u16() == 401 || status.as_u16() == 403 {
                    tracing::debug!("Session probe rejected token ({})", status);
                    ProbeOutcome::Invalid
                } else if status.is_success() {
                    ProbeOutcome::Valid
                } else {
                    tracing::warn!("Session probe indeterminate status: {}", status);
                    ProbeOutcome::Invalid
                }
            }
            Err(e) => {
                tracing::warn!("Session probe request failed: {}", e);
                ProbeOutcome::Invalid
            }
        }
    }
}
