// session.rs

use crate::auth::{AuthEvent, ProviderSession};
use serde::{Deserialize, Serialize};
use std::fs::{File, create_dir_all, remove_file};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// What the client holds for an authenticated user. The token is an opaque
/// bearer credential; the email is display-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    #[serde(default)]
    pub user_email: Option<String>,
}

#[derive(Default)]
struct SessionState {
    // In-memory mirror of the session file. Survives restarts.
    durable: Option<StoredSession>,
    // Process-held only, gone when the program exits.
    volatile: Option<StoredSession>,
    hydrated: bool,
}

/// Instruction back to the caller after an auth event was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSignal {
    None,
    /// The provider reported a sign-out; navigate to the login screen.
    SignedOut,
}

/// Single source of truth for "is the user authenticated, and with what
/// token". Two storage tiers: a JSON file under the config dir (remember-me)
/// and plain process memory. Reads check durable first.
///
/// Cloning shares state; worker threads and the reminder daemon read the
/// token through their own clone. Only this store and the auth-event handler
/// write it.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<Mutex<SessionState>>,
    path: PathBuf,
}

impl SessionStore {
    /// Opens the store without touching the disk; call `hydrate` to read the
    /// durable tier.
    pub fn open(path: PathBuf) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            path,
        }
    }

    /// Reads the durable tier from disk. A missing or unreadable file leaves
    /// the tier empty; either way the store counts as hydrated afterwards.
    pub fn hydrate(&self) {
        let loaded: Option<StoredSession> = File::open(&self.path)
            .ok()
            .and_then(|file| serde_json::from_reader(BufReader::new(file)).ok());
        let mut state = self.state.lock().unwrap();
        state.durable = loaded;
        state.hydrated = true;
    }

    pub fn is_hydrated(&self) -> bool {
        self.state.lock().unwrap().hydrated
    }

    pub fn token(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .durable
            .as_ref()
            .or(state.volatile.as_ref())
            .map(|s| s.access_token.clone())
    }

    pub fn user_email(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .durable
            .as_ref()
            .or(state.volatile.as_ref())
            .and_then(|s| s.user_email.clone())
    }

    /// Stores a fresh session. `durable` is the remember-me choice: true
    /// writes the file tier, false keeps it in memory only.
    pub fn set_session(&self, session: StoredSession, durable: bool) {
        let mut state = self.state.lock().unwrap();
        if durable {
            self.write_file(&session);
            state.durable = Some(session);
            state.volatile = None;
        } else {
            state.volatile = Some(session);
        }
    }

    /// Removes the session from both tiers. Safe to call repeatedly.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.durable = None;
        state.volatile = None;
        match remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => eprintln!("Failed to remove session file: {}", e),
        }
    }

    /// Applies one event from the identity provider's auth-state stream.
    /// Signed-in and token-refreshed re-persist into whichever tier already
    /// holds a session (a fresh sign-in with no prior session lands
    /// volatile; the login flow calls `set_session` itself when the user
    /// picked remember-me).
    pub fn apply_event(&self, event: &AuthEvent) -> SessionSignal {
        match event {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                let stored = StoredSession {
                    access_token: session.access_token.clone(),
                    user_email: session.user_email.clone(),
                };
                let durable = self.state.lock().unwrap().durable.is_some();
                self.set_session(stored, durable);
                SessionSignal::None
            }
            AuthEvent::SignedOut => {
                self.clear();
                SessionSignal::SignedOut
            }
        }
    }

    fn write_file(&self, session: &StoredSession) {
        if let Some(parent) = self.path.parent() {
            create_dir_all(parent).ok();
        }
        let file = match File::create(&self.path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Failed to open session file: {}", e);
                return;
            }
        };
        let writer = BufWriter::new(file);
        if let Err(e) = serde_json::to_writer_pretty(writer, session) {
            eprintln!("Failed to write session file: {}", e);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&self.path, perms);
        }
    }
}

/// Builds a `StoredSession` from what the provider handed back.
impl From<&ProviderSession> for StoredSession {
    fn from(s: &ProviderSession) -> Self {
        Self {
            access_token: s.access_token.clone(),
            user_email: s.user_email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SessionStore {
        SessionStore::open(dir.path().join("session.json"))
    }

    fn session(token: &str) -> StoredSession {
        StoredSession {
            access_token: token.to_string(),
            user_email: Some("ana@example.com".to_string()),
        }
    }

    #[test]
    fn durable_session_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.hydrate();
        store.set_session(session("tok-1"), true);

        let reopened = store_in(&dir);
        reopened.hydrate();
        assert_eq!(reopened.token().as_deref(), Some("tok-1"));
        assert_eq!(reopened.user_email().as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn volatile_session_does_not_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.hydrate();
        store.set_session(session("tok-2"), false);
        assert_eq!(store.token().as_deref(), Some("tok-2"));

        let reopened = store_in(&dir);
        reopened.hydrate();
        assert!(reopened.token().is_none());
    }

    #[test]
    fn durable_tier_is_read_first() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.hydrate();
        store.set_session(session("volatile-tok"), false);
        store.set_session(session("durable-tok"), true);
        assert_eq!(store.token().as_deref(), Some("durable-tok"));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.hydrate();
        store.set_session(session("tok-3"), true);

        store.clear();
        assert!(store.token().is_none());
        store.clear();
        assert!(store.token().is_none());
        assert!(!dir.path().join("session.json").exists());
    }

    #[test]
    fn starts_unhydrated() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(!store.is_hydrated());
        store.hydrate();
        assert!(store.is_hydrated());
    }

    #[test]
    fn corrupt_file_hydrates_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        let store = SessionStore::open(path);
        store.hydrate();
        assert!(store.is_hydrated());
        assert!(store.token().is_none());
    }

    #[test]
    fn signed_out_event_clears_and_signals() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.hydrate();
        store.set_session(session("tok-4"), true);

        let signal = store.apply_event(&AuthEvent::SignedOut);
        assert_eq!(signal, SessionSignal::SignedOut);
        assert!(store.token().is_none());
    }

    #[test]
    fn refresh_event_keeps_the_durable_tier() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.hydrate();
        store.set_session(session("old-tok"), true);

        let refreshed = ProviderSession {
            access_token: "new-tok".to_string(),
            refresh_token: None,
            user_email: Some("ana@example.com".to_string()),
        };
        store.apply_event(&AuthEvent::TokenRefreshed(refreshed));
        assert_eq!(store.token().as_deref(), Some("new-tok"));

        // Still on disk, i.e. still durable.
        let reopened = store_in(&dir);
        reopened.hydrate();
        assert_eq!(reopened.token().as_deref(), Some("new-tok"));
    }

    #[test]
    fn sign_in_event_with_no_prior_session_stays_volatile() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.hydrate();

        let fresh = ProviderSession {
            access_token: "oauth-tok".to_string(),
            refresh_token: None,
            user_email: None,
        };
        store.apply_event(&AuthEvent::SignedIn(fresh));
        assert_eq!(store.token().as_deref(), Some("oauth-tok"));
        assert!(!dir.path().join("session.json").exists());
    }
}
