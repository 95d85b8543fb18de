//! Campus portal client, the upstream [`ReadingSource`].
//!
//! `POST {portal}/login` trades the account for a bearer token, then
//! `GET {portal}/remaining_power?room=<id>` returns one room's balance.
//! The token is kept in memory and, when a secret store is given, on disk
//! so later runs skip the login.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dormwatt_core::config::AccountConfig;
use dormwatt_core::error::{DormwattError, Result};
use dormwatt_core::traits::{ReadingSource, SecretStore};
use dormwatt_core::types::Balances;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct PowerResponse {
    balance: f64,
}

pub struct PortalSource {
    client: reqwest::Client,
    portal_url: String,
    username: String,
    password: String,
    lt_room: String,
    ac_room: String,
    token_store: Option<Arc<dyn SecretStore>>,
    session: Mutex<Option<String>>,
}

impl PortalSource {
    /// `None` when the account section is incomplete.
    pub fn from_config(
        config: &AccountConfig,
        token_store: Option<Arc<dyn SecretStore>>,
    ) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        Some(Self {
            client: reqwest::Client::new(),
            portal_url: config.portal_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            lt_room: config.lt_room.clone(),
            ac_room: config.ac_room.clone(),
            token_store,
            session: Mutex::new(None),
        })
    }

    async fn login(&self) -> Result<String> {
        tracing::info!("🔑 Logging in to portal...");
        let resp = self
            .client
            .post(format!("{}/login", self.portal_url))
            .json(&serde_json::json!({
                "account": self.username,
                "password": self.password,
            }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| DormwattError::Upstream(format!("Login request failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DormwattError::AuthFailed(format!("Login rejected ({status})")));
        }
        if !status.is_success() {
            return Err(DormwattError::Upstream(format!("Login HTTP {status}")));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| DormwattError::Upstream(format!("Login response: {e}")))?;
        tracing::info!("✅ Login succeeded");

        if let Some(store) = &self.token_store
            && let Err(e) = store.save(login.token.as_bytes())
        {
            tracing::warn!("⚠️ Could not cache session token: {e}");
        }
        Ok(login.token)
    }

    /// Cached token if there is one, else a fresh login.
    async fn session_token(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        if let Some(token) = session.as_ref() {
            return Ok(token.clone());
        }

        let cached = match &self.token_store {
            Some(store) => match store.load() {
                Ok(blob) => blob.and_then(|b| String::from_utf8(b).ok()),
                Err(e) => {
                    tracing::warn!("⚠️ Ignoring unreadable session cache: {e}");
                    None
                }
            },
            None => None,
        };

        let token = match cached {
            Some(token) if !token.is_empty() => {
                tracing::debug!("Reusing cached session token");
                token
            }
            _ => self.login().await?,
        };
        *session = Some(token.clone());
        Ok(token)
    }

    async fn forget_session(&self) {
        *self.session.lock().await = None;
        if let Some(store) = &self.token_store
            && let Err(e) = store.clear()
        {
            tracing::warn!("⚠️ Could not clear session cache: {e}");
        }
    }

    async fn remaining_power(&self, token: &str, room: &str) -> Result<f64> {
        let resp = self
            .client
            .get(format!("{}/remaining_power", self.portal_url))
            .query(&[("room", room)])
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| DormwattError::Upstream(format!("Balance request failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            self.forget_session().await;
            return Err(DormwattError::AuthFailed("Session expired".into()));
        }
        if !status.is_success() {
            return Err(DormwattError::Upstream(format!(
                "Balance HTTP {status} for room {room}"
            )));
        }

        let power: PowerResponse = resp
            .json()
            .await
            .map_err(|e| DormwattError::Upstream(format!("Balance response: {e}")))?;
        Ok(power.balance)
    }
}

#[async_trait]
impl ReadingSource for PortalSource {
    fn name(&self) -> &str {
        "portal"
    }

    async fn fetch_balances(&self) -> Result<Balances> {
        let token = self.session_token().await?;
        tracing::info!("🔍 Fetching lighting and air-conditioning balances...");
        let lt = self.remaining_power(&token, &self.lt_room).await?;
        let ac = self.remaining_power(&token, &self.ac_room).await?;
        tracing::info!("⚡ Lighting: {lt} kWh, air-conditioning: {ac} kWh");
        Ok(Balances::new(lt, ac))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Clone, Default)]
    struct Portal {
        logins: Arc<AtomicU32>,
        /// Token the balance endpoint accepts.
        valid: Arc<StdMutex<String>>,
        reject_login: bool,
    }

    async fn login(State(p): State<Portal>) -> Response {
        if p.reject_login {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        let n = p.logins.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("tok-{n}");
        *p.valid.lock().unwrap() = token.clone();
        axum::Json(serde_json::json!({ "token": token })).into_response()
    }

    async fn power(
        State(p): State<Portal>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> Response {
        let expected = format!("Bearer {}", p.valid.lock().unwrap());
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if auth != expected {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        let balance = match q.get("room").map(String::as_str) {
            Some("lt-1") => 12.5,
            Some("ac-1") => 230.0,
            _ => return StatusCode::NOT_FOUND.into_response(),
        };
        axum::Json(serde_json::json!({ "balance": balance })).into_response()
    }

    async fn serve(portal: Portal) -> String {
        let router = Router::new()
            .route("/login", post(login))
            .route("/remaining_power", get(power))
            .with_state(portal);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// In-memory token cache.
    #[derive(Default)]
    struct MemoryStore(StdMutex<Option<Vec<u8>>>);

    impl SecretStore for MemoryStore {
        fn save(&self, blob: &[u8]) -> Result<()> {
            *self.0.lock().unwrap() = Some(blob.to_vec());
            Ok(())
        }
        fn load(&self) -> Result<Option<Vec<u8>>> {
            Ok(self.0.lock().unwrap().clone())
        }
        fn clear(&self) -> Result<()> {
            *self.0.lock().unwrap() = None;
            Ok(())
        }
    }

    fn account(url: &str) -> AccountConfig {
        AccountConfig {
            username: "20240001".into(),
            password: "pw".into(),
            lt_room: "lt-1".into(),
            ac_room: "ac-1".into(),
            portal_url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_complete_account() {
        assert!(PortalSource::from_config(&AccountConfig::default(), None).is_none());
    }

    #[tokio::test]
    async fn test_fetch_logs_in_once() {
        let portal = Portal::default();
        let url = serve(portal.clone()).await;
        let store = Arc::new(MemoryStore::default());
        let cache = store.clone() as Arc<dyn SecretStore>;
        let source = PortalSource::from_config(&account(&url), Some(cache)).unwrap();

        let b = source.fetch_balances().await.unwrap();
        assert_eq!(b, Balances::new(12.5, 230.0));
        source.fetch_balances().await.unwrap();

        assert_eq!(portal.logins.load(Ordering::SeqCst), 1);
        assert_eq!(store.load().unwrap(), Some(b"tok-1".to_vec()));
    }

    #[tokio::test]
    async fn test_cached_token_is_reused_across_sources() {
        let portal = Portal::default();
        let url = serve(portal.clone()).await;
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::default());

        PortalSource::from_config(&account(&url), Some(store.clone() as Arc<dyn SecretStore>))
            .unwrap()
            .fetch_balances()
            .await
            .unwrap();
        PortalSource::from_config(&account(&url), Some(store.clone() as Arc<dyn SecretStore>))
            .unwrap()
            .fetch_balances()
            .await
            .unwrap();

        assert_eq!(portal.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_cleared_and_retryable() {
        let portal = Portal::default();
        let url = serve(portal.clone()).await;
        let store = Arc::new(MemoryStore::default());
        store.save(b"stale").unwrap();
        let cache = store.clone() as Arc<dyn SecretStore>;
        let source = PortalSource::from_config(&account(&url), Some(cache)).unwrap();

        let err = source.fetch_balances().await.unwrap_err();
        assert!(matches!(err, DormwattError::AuthFailed(_)));
        assert!(err.is_retryable());
        assert_eq!(store.load().unwrap(), None);

        // Next attempt logs in afresh.
        assert!(source.fetch_balances().await.is_ok());
        assert_eq!(portal.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_login() {
        let portal = Portal {
            reject_login: true,
            ..Default::default()
        };
        let url = serve(portal).await;
        let source = PortalSource::from_config(&account(&url), None).unwrap();
        assert!(matches!(
            source.fetch_balances().await,
            Err(DormwattError::AuthFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_portal_is_retryable() {
        let source = PortalSource::from_config(&account("http://127.0.0.1:1"), None).unwrap();
        let err = source.fetch_balances().await.unwrap_err();
        assert!(matches!(err, DormwattError::Upstream(_)));
        assert!(err.is_retryable());
    }
}
