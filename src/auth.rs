// auth.rs

use crate::api::{log_http_request, log_http_response};
use crate::error::{ApiError, ApiResult};
use crate::session::SessionStore;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, Sender, channel};

/// A session as the identity provider reports it.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_email: Option<String>,
}

/// Auth-state changes pushed by the provider. Drained by the event loop once
/// per tick and applied to the session store.
#[derive(Clone, Debug)]
pub enum AuthEvent {
    SignedIn(ProviderSession),
    SignedOut,
    TokenRefreshed(ProviderSession),
}

/// The external session service. Behind a trait so the route guard and the
/// screens can be exercised against a stub.
pub trait IdentityProvider {
    /// Checks whether the currently held token still names a live session.
    /// `Ok(None)` means "not signed in"; errors mean the provider itself
    /// could not be asked.
    fn get_session(&self) -> ApiResult<Option<ProviderSession>>;
    fn sign_in_with_password(&self, email: &str, password: &str) -> ApiResult<ProviderSession>;
    /// Returns the URL to hand to a browser for the given OAuth provider.
    fn sign_in_with_oauth(&self, provider: &str) -> ApiResult<String>;
    fn sign_out(&self) -> ApiResult<()>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<UserInfo>,
}

#[derive(Deserialize)]
struct UserInfo {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

/// HTTP implementation against the provider's REST endpoints. Emits an
/// `AuthEvent` for every state change it causes; the receiver is handed out
/// once at construction.
pub struct AuthClient {
    base_url: String,
    client: Client,
    session: SessionStore,
    events: Sender<AuthEvent>,
    // Only lives for this process; the durable session file never holds it.
    refresh_token: Mutex<Option<String>>,
}

impl AuthClient {
    pub fn new(base_url: &str, session: SessionStore) -> (Self, Receiver<AuthEvent>) {
        let (tx, rx) = channel();
        (
            Self {
                base_url: base_url.trim_end_matches('/').to_string(),
                client: Client::new(),
                session,
                events: tx,
                refresh_token: Mutex::new(None),
            },
            rx,
        )
    }

    fn emit(&self, event: AuthEvent) {
        self.events.send(event).ok();
    }

    fn provider_error(status: u16, body: &str) -> ApiError {
        let message = serde_json::from_str::<ProviderErrorBody>(body)
            .ok()
            .and_then(|b| b.error_description.or(b.msg))
            .unwrap_or_else(|| format!("HTTP {}", status));
        ApiError::AuthProvider(message)
    }

    fn token_request(&self, grant_type: &str, body: serde_json::Value) -> ApiResult<ProviderSession> {
        let url = format!("{}/token?grant_type={}", self.base_url, grant_type);
        log_http_request(
            "POST",
            &url,
            &[("Content-Type", "application/json")],
            Some("{\"password\":\"***\"}"),
        );
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .map_err(ApiError::network)?;
        let status = resp.status();
        let text = resp.text().map_err(ApiError::network)?;
        log_http_response(status.as_u16(), &text);
        if !status.is_success() {
            return Err(Self::provider_error(status.as_u16(), &text));
        }
        let parsed: TokenResponse = serde_json::from_str(&text)?;
        let session = ProviderSession {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            user_email: parsed.user.and_then(|u| u.email),
        };
        *self.refresh_token.lock().unwrap() = session.refresh_token.clone();
        Ok(session)
    }

    fn fetch_user(&self, token: &str) -> ApiResult<Option<Option<String>>> {
        // Outer None: the token no longer names a session. Inner option is
        // the email, which the provider may omit.
        let url = format!("{}/user", self.base_url);
        let auth = format!("Bearer {}", token);
        log_http_request("GET", &url, &[("Authorization", auth.as_str())], None);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", auth)
            .send()
            .map_err(ApiError::network)?;
        let status = resp.status();
        let text = resp.text().map_err(ApiError::network)?;
        log_http_response(status.as_u16(), &text);
        if status.as_u16() == 401 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::provider_error(status.as_u16(), &text));
        }
        let user: UserInfo = serde_json::from_str(&text)?;
        Ok(Some(user.email))
    }

    /// Completes the OAuth paste-back flow: the user signed in from a
    /// browser and pasted the resulting access token here. The token is
    /// confirmed against the provider before it is accepted.
    pub fn complete_oauth(&self, pasted_token: &str) -> ApiResult<ProviderSession> {
        let token = pasted_token.trim();
        if token.is_empty() {
            return Err(ApiError::Validation("Paste the access token first".to_string()));
        }
        match self.fetch_user(token)? {
            Some(email) => {
                let session = ProviderSession {
                    access_token: token.to_string(),
                    refresh_token: None,
                    user_email: email,
                };
                self.emit(AuthEvent::SignedIn(session.clone()));
                Ok(session)
            }
            None => Err(ApiError::AuthProvider("auth_failed".to_string())),
        }
    }

    /// Exchanges the refresh token from the last sign-in for a new session
    /// and announces it as a token-refreshed event.
    pub fn refresh_session(&self) -> ApiResult<ProviderSession> {
        let refresh = self
            .refresh_token
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::AuthProvider("No refresh token held".to_string()))?;
        let session = self.token_request("refresh_token", json!({ "refresh_token": refresh }))?;
        self.emit(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }
}

impl IdentityProvider for AuthClient {
    fn get_session(&self) -> ApiResult<Option<ProviderSession>> {
        let Some(token) = self.session.token() else {
            return Ok(None);
        };
        match self.fetch_user(&token)? {
            Some(email) => Ok(Some(ProviderSession {
                access_token: token,
                refresh_token: None,
                user_email: email,
            })),
            None => Ok(None),
        }
    }

    fn sign_in_with_password(&self, email: &str, password: &str) -> ApiResult<ProviderSession> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ApiError::Validation("Fill in every field".to_string()));
        }
        let session = self.token_request(
            "password",
            json!({ "email": email.trim(), "password": password }),
        )?;
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    fn sign_in_with_oauth(&self, provider: &str) -> ApiResult<String> {
        Ok(format!("{}/authorize?provider={}", self.base_url, provider))
    }

    /// Best effort against the provider; the local sign-out always happens,
    /// so a dead provider cannot keep the user logged in.
    fn sign_out(&self) -> ApiResult<()> {
        if let Some(token) = self.session.token() {
            let url = format!("{}/logout", self.base_url);
            let auth = format!("Bearer {}", token);
            log_http_request("POST", &url, &[("Authorization", auth.as_str())], None);
            match self.client.post(&url).header("Authorization", auth).send() {
                Ok(resp) => log_http_response(resp.status().as_u16(), ""),
                Err(e) => eprintln!("Logout request failed: {}", e),
            }
        }
        *self.refresh_token.lock().unwrap() = None;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, SessionStore) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path().join("session.json"));
        store.hydrate();
        (dir, store)
    }

    #[test]
    fn password_sign_in_returns_session_and_emits_event() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/token")
            .match_query(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "password".into(),
            ))
            .with_status(200)
            .with_body(
                r#"{"access_token":"tok-a","refresh_token":"ref-a","user":{"email":"ana@example.com"}}"#,
            )
            .create();

        let (_dir, session) = store();
        let (auth, events) = AuthClient::new(&server.url(), session);
        let result = auth.sign_in_with_password("ana@example.com", "hunter2").unwrap();
        mock.assert();
        assert_eq!(result.access_token, "tok-a");
        assert_eq!(result.user_email.as_deref(), Some("ana@example.com"));
        assert!(matches!(events.try_recv(), Ok(AuthEvent::SignedIn(_))));
    }

    #[test]
    fn bad_credentials_yield_provider_error_without_event() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/token")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
            .create();

        let (_dir, session) = store();
        let (auth, events) = AuthClient::new(&server.url(), session);
        let err = auth.sign_in_with_password("ana@example.com", "wrong").unwrap_err();
        match err {
            ApiError::AuthProvider(msg) => assert_eq!(msg, "Invalid login credentials"),
            other => panic!("expected AuthProvider, got {:?}", other),
        }
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn get_session_without_token_skips_the_provider() {
        let mut server = mockito::Server::new();
        let mock = server.mock("GET", "/user").expect(0).create();

        let (_dir, session) = store();
        let (auth, _events) = AuthClient::new(&server.url(), session);
        assert!(auth.get_session().unwrap().is_none());
        mock.assert();
    }

    #[test]
    fn get_session_confirms_live_token() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/user")
            .match_header("authorization", "Bearer tok-b")
            .with_status(200)
            .with_body(r#"{"email":"ana@example.com"}"#)
            .create();

        let (_dir, session) = store();
        session.set_session(
            crate::session::StoredSession {
                access_token: "tok-b".to_string(),
                user_email: None,
            },
            false,
        );
        let (auth, _events) = AuthClient::new(&server.url(), session);
        let live = auth.get_session().unwrap().unwrap();
        assert_eq!(live.access_token, "tok-b");
        assert_eq!(live.user_email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn get_session_maps_rejected_token_to_none() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/user").with_status(401).create();

        let (_dir, session) = store();
        session.set_session(
            crate::session::StoredSession {
                access_token: "stale".to_string(),
                user_email: None,
            },
            false,
        );
        let (auth, _events) = AuthClient::new(&server.url(), session);
        assert!(auth.get_session().unwrap().is_none());
    }

    #[test]
    fn sign_out_emits_signed_out() {
        let mut server = mockito::Server::new();
        server.mock("POST", "/logout").with_status(204).create();

        let (_dir, session) = store();
        session.set_session(
            crate::session::StoredSession {
                access_token: "tok-c".to_string(),
                user_email: None,
            },
            false,
        );
        let (auth, events) = AuthClient::new(&server.url(), session);
        auth.sign_out().unwrap();
        assert!(matches!(events.try_recv(), Ok(AuthEvent::SignedOut)));
    }

    #[test]
    fn oauth_url_names_the_provider() {
        let (_dir, session) = store();
        let (auth, _events) = AuthClient::new("http://auth.local", session);
        let url = auth.sign_in_with_oauth("google").unwrap();
        assert_eq!(url, "http://auth.local/authorize?provider=google");
    }

    #[test]
    fn complete_oauth_rejects_dead_token() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/user").with_status(401).create();

        let (_dir, session) = store();
        let (auth, events) = AuthClient::new(&server.url(), session);
        let err = auth.complete_oauth("pasted").unwrap_err();
        assert!(matches!(err, ApiError::AuthProvider(_)));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn refresh_emits_token_refreshed() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/token")
            .match_query(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "password".into(),
            ))
            .with_status(200)
            .with_body(r#"{"access_token":"tok-1","refresh_token":"ref-1"}"#)
            .create();
        server
            .mock("POST", "/token")
            .match_query(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "refresh_token".into(),
            ))
            .with_status(200)
            .with_body(r#"{"access_token":"tok-2","refresh_token":"ref-2"}"#)
            .create();

        let (_dir, session) = store();
        let (auth, events) = AuthClient::new(&server.url(), session);
        auth.sign_in_with_password("ana@example.com", "hunter2").unwrap();
        let _ = events.try_recv();

        let refreshed = auth.refresh_session().unwrap();
        assert_eq!(refreshed.access_token, "tok-2");
        assert!(matches!(events.try_recv(), Ok(AuthEvent::TokenRefreshed(_))));
    }
}
