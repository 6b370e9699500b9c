// guard.rs

use crate::auth::IdentityProvider;
use crate::session::SessionStore;

/// Terminal states stay put until `reset`; `Checking` means "ask me again".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Authenticated,
    Unauthenticated,
}

const MAX_PROVIDER_ATTEMPTS: u8 = 3;

/// Gates the protected screens on authentication state.
///
/// The decision order mirrors the login check everywhere else in the app:
/// no token in either storage tier resolves straight to unauthenticated
/// without bothering the provider; a present token has to be confirmed, and
/// a rejected confirmation also clears the stored session. An unhydrated
/// session store keeps the guard in `Checking` so a reload does not bounce
/// the user to login before the durable tier was even read.
pub struct RouteGuard {
    state: GuardState,
    attempts: u8,
    last_error: Option<String>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        RouteGuard::new()
    }
}

impl RouteGuard {
    pub fn new() -> Self {
        Self {
            state: GuardState::Checking,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// The provider failure shown next to the manual retry hint, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True while a provider failure can still be retried by hand.
    pub fn can_retry(&self) -> bool {
        self.state == GuardState::Checking && self.attempts > 0
    }

    pub fn reset(&mut self) {
        self.state = GuardState::Checking;
        self.attempts = 0;
        self.last_error = None;
    }

    /// One step of the auth check. Safe to call every tick: terminal states
    /// return immediately, and provider failures are only re-attempted when
    /// the caller asks again (manual retry), capped at three attempts before
    /// failing closed.
    pub fn resolve(&mut self, session: &SessionStore, provider: &dyn IdentityProvider) -> GuardState {
        if self.state != GuardState::Checking {
            return self.state;
        }
        if !session.is_hydrated() {
            return GuardState::Checking;
        }
        if session.token().is_none() {
            self.state = GuardState::Unauthenticated;
            return self.state;
        }
        match provider.get_session() {
            Ok(Some(_)) => {
                self.state = GuardState::Authenticated;
                self.last_error = None;
            }
            Ok(None) => {
                session.clear();
                self.state = GuardState::Unauthenticated;
            }
            Err(err) => {
                self.attempts += 1;
                if self.attempts >= MAX_PROVIDER_ATTEMPTS {
                    session.clear();
                    self.state = GuardState::Unauthenticated;
                } else {
                    self.last_error = Some(err.to_string());
                }
            }
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ProviderSession;
    use crate::error::{ApiError, ApiResult};
    use crate::session::StoredSession;
    use std::cell::{Cell, RefCell};
    use tempfile::TempDir;

    struct StubProvider {
        responses: RefCell<Vec<ApiResult<Option<ProviderSession>>>>,
        calls: Cell<usize>,
    }

    impl StubProvider {
        fn new(mut responses: Vec<ApiResult<Option<ProviderSession>>>) -> Self {
            responses.reverse();
            Self {
                responses: RefCell::new(responses),
                calls: Cell::new(0),
            }
        }

        fn live_session() -> ApiResult<Option<ProviderSession>> {
            Ok(Some(ProviderSession {
                access_token: "tok".to_string(),
                refresh_token: None,
                user_email: None,
            }))
        }
    }

    impl IdentityProvider for StubProvider {
        fn get_session(&self) -> ApiResult<Option<ProviderSession>> {
            self.calls.set(self.calls.get() + 1);
            self.responses
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Ok(None))
        }

        fn sign_in_with_password(&self, _: &str, _: &str) -> ApiResult<ProviderSession> {
            unreachable!("not used by the guard")
        }

        fn sign_in_with_oauth(&self, _: &str) -> ApiResult<String> {
            unreachable!("not used by the guard")
        }

        fn sign_out(&self) -> ApiResult<()> {
            unreachable!("not used by the guard")
        }
    }

    fn hydrated_store(token: Option<&str>) -> (TempDir, SessionStore) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path().join("session.json"));
        store.hydrate();
        if let Some(token) = token {
            store.set_session(
                StoredSession {
                    access_token: token.to_string(),
                    user_email: None,
                },
                false,
            );
        }
        (dir, store)
    }

    #[test]
    fn no_token_resolves_without_provider_call() {
        let (_dir, session) = hydrated_store(None);
        let provider = StubProvider::new(vec![]);
        let mut guard = RouteGuard::new();
        assert_eq!(
            guard.resolve(&session, &provider),
            GuardState::Unauthenticated
        );
        assert_eq!(provider.calls.get(), 0);
    }

    #[test]
    fn unhydrated_store_keeps_checking() {
        let dir = TempDir::new().unwrap();
        let session = SessionStore::open(dir.path().join("session.json"));
        let provider = StubProvider::new(vec![]);
        let mut guard = RouteGuard::new();
        assert_eq!(guard.resolve(&session, &provider), GuardState::Checking);
        assert_eq!(provider.calls.get(), 0);

        // After hydration the same guard decides.
        session.hydrate();
        assert_eq!(
            guard.resolve(&session, &provider),
            GuardState::Unauthenticated
        );
    }

    #[test]
    fn confirmed_token_authenticates() {
        let (_dir, session) = hydrated_store(Some("tok"));
        let provider = StubProvider::new(vec![StubProvider::live_session()]);
        let mut guard = RouteGuard::new();
        assert_eq!(guard.resolve(&session, &provider), GuardState::Authenticated);
    }

    #[test]
    fn rejected_confirmation_clears_session() {
        let (_dir, session) = hydrated_store(Some("stale"));
        let provider = StubProvider::new(vec![Ok(None)]);
        let mut guard = RouteGuard::new();
        assert_eq!(
            guard.resolve(&session, &provider),
            GuardState::Unauthenticated
        );
        assert!(session.token().is_none());
    }

    #[test]
    fn provider_failures_allow_bounded_retries_then_fail_closed() {
        let (_dir, session) = hydrated_store(Some("tok"));
        let provider = StubProvider::new(vec![
            Err(ApiError::Network("connection refused".to_string())),
            Err(ApiError::Network("connection refused".to_string())),
            Err(ApiError::Network("connection refused".to_string())),
        ]);
        let mut guard = RouteGuard::new();

        assert_eq!(guard.resolve(&session, &provider), GuardState::Checking);
        assert!(guard.can_retry());
        assert!(guard.last_error().is_some());

        assert_eq!(guard.resolve(&session, &provider), GuardState::Checking);
        assert_eq!(
            guard.resolve(&session, &provider),
            GuardState::Unauthenticated
        );
        assert!(session.token().is_none());
        assert_eq!(provider.calls.get(), 3);
    }

    #[test]
    fn terminal_state_is_sticky_until_reset() {
        let (_dir, session) = hydrated_store(Some("tok"));
        let provider = StubProvider::new(vec![StubProvider::live_session()]);
        let mut guard = RouteGuard::new();
        guard.resolve(&session, &provider);
        guard.resolve(&session, &provider);
        assert_eq!(provider.calls.get(), 1);

        guard.reset();
        assert_eq!(guard.state(), GuardState::Checking);
    }
}
