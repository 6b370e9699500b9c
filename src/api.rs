// api.rs

use crate::error::{ApiError, ApiResult};
use crate::session::SessionStore;
use crate::task::{Task, TaskPayload};
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Value;
#[cfg(debug_assertions)]
use std::fs::OpenOptions;
#[cfg(debug_assertions)]
use std::io::Write as IoWrite;
#[cfg(debug_assertions)]
use std::path::PathBuf;

#[cfg(debug_assertions)]
pub(crate) fn log_http_request(method: &str, url: &str, headers: &[(&str, &str)], body: Option<&str>) {
    let head = format!("[HTTP OUT] {} {}", method, url);
    eprintln!("{}", head);
    log_to_file_line(&head);
    for (k, v) in headers {
        let shown = if k.eq_ignore_ascii_case("authorization") {
            mask_bearer(v)
        } else {
            (*v).to_string()
        };
        let hline = format!("  {}: {}", k, shown);
        eprintln!("{}", hline);
        log_to_file_line(&hline);
    }
    if let Some(b) = body {
        let bline = format!("  Body: {}", truncate(b, 2000));
        eprintln!("{}", bline);
        log_to_file_line(&bline);
    }
}

#[cfg(debug_assertions)]
pub(crate) fn log_http_response(status: u16, body: &str) {
    let head = format!("[HTTP IN] Status: {}", status);
    eprintln!("{}", head);
    log_to_file_line(&head);
    if !body.is_empty() {
        let bline = format!("  Body: {}", truncate(body, 2000));
        eprintln!("{}", bline);
        log_to_file_line(&bline);
    }
}

#[cfg(debug_assertions)]
fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…(+{} bytes)", &s[..max], s.len() - max)
    }
}

#[cfg(debug_assertions)]
fn mask_bearer(v: &str) -> String {
    if let Some(token) = v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")) {
        let head = &token[..token.len().min(6)];
        let tail = &token[token.len().saturating_sub(4)..];
        format!("Bearer {}…{}", head, tail)
    } else {
        "*****".to_string()
    }
}

#[cfg(debug_assertions)]
fn log_file_path() -> PathBuf {
    crate::config::config_dir().join("listo_debug.log")
}

#[cfg(debug_assertions)]
fn log_to_file_line(s: &str) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(log_file_path()) {
        let _ = writeln!(f, "{}", s);
    }
}

#[cfg(not(debug_assertions))]
pub(crate) fn log_http_request(_method: &str, _url: &str, _headers: &[(&str, &str)], _body: Option<&str>) {}
#[cfg(not(debug_assertions))]
pub(crate) fn log_http_response(_status: u16, _body: &str) {}

/// Registration rejections carry `message` either as one string or a list.
#[derive(Deserialize)]
struct RegisterErrorBody {
    #[serde(default)]
    message: Option<MessageField>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageField {
    One(String),
    Many(Vec<String>),
}

impl MessageField {
    fn join(self) -> String {
        match self {
            MessageField::One(s) => s,
            MessageField::Many(list) => list.join(", "),
        }
    }
}

/// Typed wrapper around the Listo task endpoints. One method per lifecycle
/// action, each a single attempt: the caller decides what a failure means.
/// The bearer token is read from the session store on every call.
#[derive(Clone)]
pub struct TaskApi {
    base_url: String,
    client: Client,
    session: SessionStore,
}

impl TaskApi {
    pub fn new(base_url: &str, session: SessionStore) -> Result<Self, String> {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| format!("HTTP client build failed: {}", e))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            session,
        })
    }

    /// Central request path. Returns the response body, or `None` for a 204.
    fn request(&self, method: Method, path: &str, body: Option<&Value>) -> ApiResult<Option<String>> {
        let url = format!("{}/{}", self.base_url, path);
        let token = self.session.token();

        let mut req = self
            .client
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache");
        let auth = token.map(|t| format!("Bearer {}", t));
        if let Some(ref auth) = auth {
            req = req.header("Authorization", auth.clone());
        }
        if let Some(json) = body {
            req = req.json(json);
        }

        {
            let mut headers: Vec<(&str, &str)> = vec![
                ("Content-Type", "application/json"),
                ("Cache-Control", "no-cache"),
                ("Pragma", "no-cache"),
            ];
            if let Some(ref auth) = auth {
                headers.push(("Authorization", auth.as_str()));
            }
            log_http_request(
                method.as_str(),
                &url,
                &headers,
                body.map(|b| b.to_string()).as_deref(),
            );
        }

        let resp = req.send().map_err(ApiError::network)?;
        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        log_http_response(status.as_u16(), &text);

        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if status.as_u16() == 204 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ApiError::Http(status.as_u16()));
        }
        Ok(Some(text))
    }

    fn expect_body(body: Option<String>) -> ApiResult<String> {
        body.ok_or_else(|| ApiError::Network("Empty response where a body was expected".to_string()))
    }

    pub fn create_task(&self, payload: &TaskPayload) -> ApiResult<Task> {
        payload.validate()?;
        let body = serde_json::to_value(payload)?;
        let text = Self::expect_body(self.request(Method::POST, "api/v1/tasks", Some(&body))?)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn get_by_id(&self, task_id: &str) -> ApiResult<Task> {
        let path = format!("api/v1/tasks/{}", task_id);
        let text = Self::expect_body(self.request(Method::GET, &path, None)?)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn update_task(&self, payload: &TaskPayload, task_id: &str) -> ApiResult<Task> {
        payload.validate()?;
        let body = serde_json::to_value(payload)?;
        let path = format!("api/v1/tasks/{}", task_id);
        let text = Self::expect_body(self.request(Method::PUT, &path, Some(&body))?)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn list(&self) -> ApiResult<Vec<Task>> {
        let text = Self::expect_body(self.request(Method::GET, "api/v1/tasks/list", None)?)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn list_completed(&self) -> ApiResult<Vec<Task>> {
        let text = Self::expect_body(self.request(Method::GET, "api/v1/tasks/list/completed", None)?)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Marks a task complete. Some deployments answer with the updated task,
    /// others with an empty 204; both count as success.
    pub fn complete_task(&self, task_id: &str) -> ApiResult<Option<Task>> {
        let path = format!("api/v1/tasks/completed/{}", task_id);
        match self.request(Method::PUT, &path, None)? {
            Some(text) if !text.trim().is_empty() => Ok(Some(serde_json::from_str(&text)?)),
            _ => Ok(None),
        }
    }

    pub fn delete_task(&self, task_id: &str) -> ApiResult<()> {
        let path = format!("api/v1/tasks/delete/{}", task_id);
        self.request(Method::DELETE, &path, None)?;
        Ok(())
    }

    /// Creates an account. Server-side rejections surface their `message`
    /// (string or list) as a validation error for the form to display.
    pub fn register(&self, name: &str, email: &str, password: &str) -> ApiResult<()> {
        let url = format!("{}/api/v1/auth/register", self.base_url);
        let body = serde_json::json!({ "name": name, "email": email, "password": password });
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
        let text = resp.text().unwrap_or_default();
        log_http_response(status.as_u16(), &text);
        if status.is_success() {
            return Ok(());
        }
        let message = serde_json::from_str::<RegisterErrorBody>(&text)
            .ok()
            .and_then(|b| b.message)
            .map(MessageField::join);
        match message {
            Some(msg) => Err(ApiError::Validation(msg)),
            None => Err(ApiError::Http(status.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StoredSession;
    use crate::task::{Priority, Status};
    use tempfile::TempDir;

    fn session_with_token(token: Option<&str>) -> (TempDir, SessionStore) {
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

    fn task_json(id: &str, title: &str) -> String {
        format!(
            r#"{{"id":"{}","title":"{}","description":"","status":"new","priority":2,
                "created_at":"2025-05-01T10:00:00Z","updated_at":"2025-05-01T10:00:00Z",
                "due_date":null,"archived_at":null,"completed_at":null,"deleted_at":null,
                "source_url":null,"user_id":"u-1"}}"#,
            id, title
        )
    }

    #[test]
    fn list_attaches_bearer_and_no_cache_headers() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/api/v1/tasks/list")
            .match_header("authorization", "Bearer tok-1")
            .match_header("cache-control", "no-cache")
            .match_header("pragma", "no-cache")
            .with_status(200)
            .with_body(format!("[{}]", task_json("1", "Buy milk")))
            .create();

        let (_dir, session) = session_with_token(Some("tok-1"));
        let api = TaskApi::new(&server.url(), session).unwrap();
        let tasks = api.list().unwrap();
        mock.assert();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "1");
        assert_eq!(tasks[0].title, "Buy milk");
    }

    #[test]
    fn missing_token_sends_no_authorization_header() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/api/v1/tasks/list")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(200)
            .with_body("[]")
            .create();

        let (_dir, session) = session_with_token(None);
        let api = TaskApi::new(&server.url(), session).unwrap();
        assert!(api.list().unwrap().is_empty());
        mock.assert();
    }

    #[test]
    fn http_401_maps_to_unauthorized() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/api/v1/tasks/9")
            .with_status(401)
            .create();

        let (_dir, session) = session_with_token(Some("stale"));
        let api = TaskApi::new(&server.url(), session).unwrap();
        assert!(matches!(api.get_by_id("9"), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn other_failures_map_to_http_status() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/api/v1/tasks/list")
            .with_status(503)
            .create();

        let (_dir, session) = session_with_token(Some("tok"));
        let api = TaskApi::new(&server.url(), session).unwrap();
        assert!(matches!(api.list(), Err(ApiError::Http(503))));
    }

    #[test]
    fn unreachable_server_maps_to_network() {
        let (_dir, session) = session_with_token(Some("tok"));
        // Nothing listens on port 1.
        let api = TaskApi::new("http://127.0.0.1:1", session).unwrap();
        let err = api.list().unwrap_err();
        assert!(err.is_connectivity(), "got {:?}", err);
    }

    #[test]
    fn delete_accepts_204() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("DELETE", "/api/v1/tasks/delete/7")
            .with_status(204)
            .create();

        let (_dir, session) = session_with_token(Some("tok"));
        let api = TaskApi::new(&server.url(), session).unwrap();
        api.delete_task("7").unwrap();
        mock.assert();
    }

    #[test]
    fn complete_accepts_body_or_204() {
        let mut server = mockito::Server::new();
        server
            .mock("PUT", "/api/v1/tasks/completed/3")
            .with_status(200)
            .with_body(task_json("3", "Ship release"))
            .create();
        server
            .mock("PUT", "/api/v1/tasks/completed/4")
            .with_status(204)
            .create();

        let (_dir, session) = session_with_token(Some("tok"));
        let api = TaskApi::new(&server.url(), session).unwrap();
        assert_eq!(api.complete_task("3").unwrap().unwrap().id, "3");
        assert!(api.complete_task("4").unwrap().is_none());
    }

    #[test]
    fn create_posts_payload_and_parses_created_task() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/v1/tasks")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "title": "A task",
                "description": "desc desc desc",
                "status": "new",
                "priority": 2
            })))
            .with_status(201)
            .with_body(task_json("9", "A task"))
            .create();

        let (_dir, session) = session_with_token(Some("tok"));
        let api = TaskApi::new(&server.url(), session).unwrap();
        let created = api
            .create_task(&TaskPayload::new("A task", "desc desc desc"))
            .unwrap();
        mock.assert();
        assert_eq!(created.id, "9");
        assert_eq!(created.status, Status::New);
        assert_eq!(created.priority, Priority::Medium);
    }

    #[test]
    fn invalid_payload_never_reaches_the_server() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", "/api/v1/tasks").expect(0).create();

        let (_dir, session) = session_with_token(Some("tok"));
        let api = TaskApi::new(&server.url(), session).unwrap();
        let err = api.create_task(&TaskPayload::new("ab", "")).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        mock.assert();
    }

    #[test]
    fn register_joins_message_arrays() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/api/v1/auth/register")
            .with_status(400)
            .with_body(r#"{"message":["email already taken","password too weak"]}"#)
            .create();

        let (_dir, session) = session_with_token(None);
        let api = TaskApi::new(&server.url(), session).unwrap();
        match api.register("Ana", "ana@example.com", "pw").unwrap_err() {
            ApiError::Validation(msg) => {
                assert_eq!(msg, "email already taken, password too weak")
            }
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn register_accepts_string_message_and_success() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/api/v1/auth/register")
            .with_status(201)
            .with_body(r#"{"id":"u-2"}"#)
            .create();

        let (_dir, session) = session_with_token(None);
        let api = TaskApi::new(&server.url(), session).unwrap();
        assert!(api.register("Ana", "ana@example.com", "pw").is_ok());
    }
}
