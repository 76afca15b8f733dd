use crate::constants::{EXPIRY_MARGIN_SECS, SUBMIT_ATTEMPTS, SUBMIT_BACKOFF_BASE_MS};
use crate::error::{AppError, AppResult};
use crate::models::AnalysisResponse;
use crate::modules::auth::{CredentialIssuer, SessionManager, SessionProbe};
use crate::utils::http::get_long_client;
use base64::Engine;
use rand::Rng;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Wire seam for the screenshot endpoint. Tests script their own transport;
/// futures are Send so submissions can run on spawned pipeline tasks.
pub trait AnalysisTransport: Send + Sync + 'static {
    fn post_screenshot(
        &self,
        bearer: &str,
        body: &serde_json::Value,
    ) -> impl std::future::Future<Output = AppResult<TransportResponse>> + Send;
}

pub struct HttpTransport {
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl AnalysisTransport for HttpTransport {
    async fn post_screenshot(
        &self,
        bearer: &str,
        body: &serde_json::Value,
    ) -> AppResult<TransportResponse> {
        let url = format!("{}/process-screenshot", self.base_url);
        let response = get_long_client()
            .post(&url)
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(TransportResponse { status, body })
    }
}

/// Submits captured frames for analysis. Owns the retry policy: transient
/// failures get a bounded backoff, an authentication rejection gets exactly
/// one refresh-and-retry before the session is declared expired.
pub struct AnalysisClient<I, P, T> {
    session: SessionManager<I, P>,
    transport: T,
}

impl<I: CredentialIssuer, P: SessionProbe, T: AnalysisTransport> AnalysisClient<I, P, T> {
    pub fn new(session: SessionManager<I, P>, transport: T) -> Self {
        Self { session, transport }
    }

    pub fn session(&self) -> &SessionManager<I, P> {
        &self.session
    }

    /// Encodes the frame and posts it, renewing the credential up front when
    /// it is inside the expiry margin so the request never goes out with a
    /// token about to die mid-flight.
    pub async fn submit(&self, jpeg_bytes: &[u8]) -> AppResult<AnalysisResponse> {
        if self.session.bearer_token().await.is_none() {
            self.session.fire_session_expired();
            return Err(AppError::SessionExpired);
        }

        if self.session.is_expiring_within(EXPIRY_MARGIN_SECS).await {
            debug!("Token inside expiry margin, refreshing before submit");
            if let Err(e) = self.session.refresh_if_stale(EXPIRY_MARGIN_SECS).await {
                warn!("Pre-submit refresh failed: {}", e);
                self.session.fire_session_expired();
                return Err(AppError::SessionExpired);
            }
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg_bytes);
        let payload = serde_json::json!({
            "screenshot_base64": format!("data:image/jpeg;base64,{}", encoded),
            "use_websocket": false,
        });

        let mut auth_retried = false;
        let mut attempt: u32 = 0;
        loop {
            let Some(bearer) = self.session.bearer_token().await else {
                self.session.fire_session_expired();
                return Err(AppError::SessionExpired);
            };

            let outcome = self.transport.post_screenshot(&bearer, &payload).await;
            attempt += 1;

            let transient: AppResult<()> = match outcome {
                Ok(response) if is_auth_rejection(response.status, &response.body) => {
                    if auth_retried {
                        warn!("Submit rejected again after token refresh");
                        self.session.fire_session_expired();
                        return Err(AppError::SessionExpired);
                    }
                    info!("Submit rejected with expired token, refreshing once");
                    auth_retried = true;
                    if self.session.force_refresh().await.is_err() {
                        self.session.fire_session_expired();
                        return Err(AppError::SessionExpired);
                    }
                    // The auth retry does not consume a transient attempt.
                    attempt -= 1;
                    continue;
                }
                Ok(response) if (200..300).contains(&response.status) => {
                    match AnalysisResponse::parse(&response.body) {
                        Ok(parsed) => {
                            debug!(
                                "Analysis received: {} blue / {} red entries",
                                parsed.blue_team.len(),
                                parsed.red_team.len()
                            );
                            return Ok(parsed);
                        }
                        Err(e) => {
                            warn!("Malformed analysis response: {}", e);
                            Err(e)
                        }
                    }
                }
                Ok(response) if response.status >= 500 => {
                    warn!("Analysis service returned {}", response.status);
                    Err(AppError::api(response.status, response.body))
                }
                Ok(response) => {
                    // Client errors other than auth rejection are not retryable.
                    return Err(AppError::api(response.status, response.body));
                }
                Err(e) => {
                    warn!("Submit request failed: {}", e);
                    Err(e)
                }
            };

            let err = transient.unwrap_err();
            if attempt >= SUBMIT_ATTEMPTS {
                return Err(err);
            }
            let jitter = rand::thread_rng().gen_range(0..250);
            let delay = SUBMIT_BACKOFF_BASE_MS * u64::from(attempt) + jitter;
            debug!("Retrying submit in {}ms (attempt {})", delay, attempt + 1);
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
    }
}

fn is_auth_rejection(status: u16, body: &str) -> bool {
    status == 401 || body.to_ascii_lowercase().contains("token is expired")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenGrant;
    use crate::modules::auth::probe::ProbeOutcome;
    use crate::modules::auth::TokenStore;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Arc;

    const GOOD_BODY: &str = r#"{
        "matchState": {"playerHero": 14},
        "matchStateAnalysis": {
            "blueTeamAnalysis": {"14": {"score": 3}},
            "redTeamAnalysis": {"21": {"score": -1}}
        }
    }"#;

    fn grant(n: usize, expires_in: i64) -> TokenGrant {
        TokenGrant {
            access_token: format!("access-{}", n),
            expires_in,
            refresh_expires_in: 1800,
            refresh_token: format!("refresh-{}", n),
            token_type: "Bearer".into(),
            session_state: "sess".into(),
            scope: "openid offline_access".into(),
        }
    }

    /// Records the order of credential and wire operations so tests can
    /// assert refresh-before-post sequencing.
    #[derive(Default)]
    struct CallLog {
        events: parking_lot::Mutex<Vec<String>>,
    }

    impl CallLog {
        fn push(&self, event: impl Into<String>) {
            self.events.lock().push(event.into());
        }

        fn snapshot(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    struct FakeIssuer {
        log: Arc<CallLog>,
        refresh_calls: AtomicUsize,
        login_expires_in: AtomicI64,
    }

    impl CredentialIssuer for Arc<FakeIssuer> {
        async fn password_grant(&self, _u: &str, _p: &str) -> AppResult<TokenGrant> {
            Ok(grant(0, self.login_expires_in.load(Ordering::SeqCst)))
        }

        async fn refresh_grant(&self, _rt: &str) -> AppResult<TokenGrant> {
            let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.log.push("refresh");
            Ok(grant(n, 300))
        }

        async fn revoke(&self, _t: &str) -> AppResult<()> {
            Ok(())
        }
    }

    struct AlwaysValidProbe;

    impl SessionProbe for AlwaysValidProbe {
        async fn validate(&self, _access_token: &str) -> ProbeOutcome {
            ProbeOutcome::Valid
        }
    }

    struct ScriptedTransport {
        log: Arc<CallLog>,
        responses: parking_lot::Mutex<VecDeque<TransportResponse>>,
        posts: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(log: Arc<CallLog>, responses: Vec<(u16, &str)>) -> Self {
            Self {
                log,
                responses: parking_lot::Mutex::new(
                    responses
                        .into_iter()
                        .map(|(status, body)| TransportResponse {
                            status,
                            body: body.to_string(),
                        })
                        .collect(),
                ),
                posts: AtomicUsize::new(0),
            }
        }
    }

    impl AnalysisTransport for Arc<ScriptedTransport> {
        async fn post_screenshot(
            &self,
            bearer: &str,
            _body: &serde_json::Value,
        ) -> AppResult<TransportResponse> {
            self.posts.fetch_add(1, Ordering::SeqCst);
            self.log.push(format!("post:{}", bearer));
            let next = self.responses.lock().pop_front();
            // Repeat the last scripted response once the script runs out.
            Ok(next.unwrap_or(TransportResponse {
                status: 503,
                body: "script exhausted".into(),
            }))
        }
    }

    struct Fixture {
        issuer: Arc<FakeIssuer>,
        transport: Arc<ScriptedTransport>,
        client: AnalysisClient<Arc<FakeIssuer>, AlwaysValidProbe, Arc<ScriptedTransport>>,
        log: Arc<CallLog>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(login_expires_in: i64, responses: Vec<(u16, &str)>) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::at(dir.path().join("token.json"));
        let log = Arc::new(CallLog::default());
        let issuer = Arc::new(FakeIssuer {
            log: log.clone(),
            refresh_calls: AtomicUsize::new(0),
            login_expires_in: AtomicI64::new(login_expires_in),
        });
        let session = SessionManager::new(issuer.clone(), AlwaysValidProbe, store);
        session.login("user", "pw").await.expect("login");
        let transport = Arc::new(ScriptedTransport::new(log.clone(), responses));
        let client = AnalysisClient::new(session, transport.clone());
        Fixture {
            issuer,
            transport,
            client,
            log,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn near_expiry_token_is_refreshed_before_post() {
        // Logged in with a token that dies in 5s, well inside the margin.
        let fx = fixture(5, vec![(200, GOOD_BODY)]).await;

        fx.client.submit(b"jpeg").await.expect("submit");

        assert_eq!(
            fx.log.snapshot(),
            vec!["refresh".to_string(), "post:access-1".to_string()]
        );
    }

    #[tokio::test]
    async fn expired_token_response_gets_one_refresh_and_retry() {
        let fx = fixture(
            300,
            vec![(401, r#"{"error": "Token is expired"}"#), (200, GOOD_BODY)],
        )
        .await;

        let parsed = fx.client.submit(b"jpeg").await.expect("submit");
        assert_eq!(parsed.blue_team.len(), 1);
        assert_eq!(fx.issuer.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.transport.posts.load(Ordering::SeqCst), 2);
        // The retry went out with the rotated token.
        assert_eq!(fx.log.snapshot()[2], "post:access-1");
    }

    #[tokio::test]
    async fn second_auth_rejection_expires_the_session() {
        let fx = fixture(
            300,
            vec![(401, "unauthorized"), (401, "unauthorized"), (200, GOOD_BODY)],
        )
        .await;

        let err = fx.client.submit(b"jpeg").await.unwrap_err();
        assert!(matches!(err, AppError::SessionExpired));
        assert!(fx.client.session().session_expired());
        assert_eq!(fx.issuer.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.transport.posts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_token_body_on_200_is_treated_as_auth_rejection() {
        let fx = fixture(
            300,
            vec![(200, r#"{"message": "TOKEN IS EXPIRED"}"#), (200, GOOD_BODY)],
        )
        .await;

        fx.client.submit(b"jpeg").await.expect("submit");
        assert_eq!(fx.issuer.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_errors_retry_a_bounded_number_of_times() {
        let fx = fixture(
            300,
            vec![(503, "down"), (503, "down"), (503, "down"), (200, GOOD_BODY)],
        )
        .await;

        let err = fx.client.submit(b"jpeg").await.unwrap_err();
        assert!(matches!(err, AppError::Api { status: Some(503), .. }));
        assert_eq!(
            fx.transport.posts.load(Ordering::SeqCst),
            SUBMIT_ATTEMPTS as usize
        );
        assert_eq!(fx.issuer.refresh_calls.load(Ordering::SeqCst), 0);
        assert!(!fx.client.session().session_expired());
    }

    #[tokio::test]
    async fn transient_failure_then_success_recovers() {
        let fx = fixture(300, vec![(502, "bad gateway"), (200, GOOD_BODY)]).await;
        fx.client.submit(b"jpeg").await.expect("submit");
        assert_eq!(fx.transport.posts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let fx = fixture(300, vec![(422, "no match visible"), (200, GOOD_BODY)]).await;

        let err = fx.client.submit(b"jpeg").await.unwrap_err();
        assert!(matches!(err, AppError::Api { status: Some(422), .. }));
        assert_eq!(fx.transport.posts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_success_body_counts_as_transient() {
        let fx = fixture(
            300,
            vec![(200, "<html>bad gateway</html>"), (200, GOOD_BODY)],
        )
        .await;
        fx.client.submit(b"jpeg").await.expect("submit");
        assert_eq!(fx.transport.posts.load(Ordering::SeqCst), 2);
    }
}
