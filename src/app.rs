// app.rs

use crate::api::TaskApi;
use crate::auth::{AuthClient, AuthEvent, IdentityProvider};
use crate::config::{self, ListoConfig};
use crate::error::{ApiError, ApiResult};
use crate::guard::{GuardState, RouteGuard};
use crate::session::{SessionSignal, SessionStore, StoredSession};
use crate::store::TaskStore;
use crate::task::{Priority, Status, Task, TaskPayload};
use crate::tui::parse_due_date;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    Login,
    Register,
    Dashboard,
    Completed,
}

#[derive(PartialEq)]
pub enum InputMode {
    Normal,
    LoginForm,
    OAuthToken, // pasting the token from the browser
    RegisterForm,
    TaskForm,
    Searching,
    ViewingTask,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoginStep {
    Email,
    Password,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegisterStep {
    Name,
    Email,
    Password,
    ConfirmPassword,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskFormStep {
    Title,
    Description,
    DueDate,
    Priority,
    SourceUrl,
}

/// Status-line feedback after an action.
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    Info(String),
    Error(String),
}

pub struct App {
    pub config: ListoConfig,
    pub session: SessionStore,
    pub auth: AuthClient,
    pub api: TaskApi,
    pub store: TaskStore,
    pub guard: RouteGuard,

    pub screen: Screen,
    pub input_mode: InputMode,

    // Login screen
    pub login_step: LoginStep,
    pub input_email: String,
    pub input_password: String,
    pub remember_me: bool,
    /// Reason code carried to the login screen, like a ?error= query param.
    pub login_notice: Option<String>,
    pub input_oauth_token: String,

    // Register screen
    pub register_step: RegisterStep,
    pub input_name: String,
    pub input_reg_email: String,
    pub input_reg_password: String,
    pub input_confirm_password: String,

    // Task form (create or edit)
    pub form_step: TaskFormStep,
    pub editing_task_id: Option<String>,
    pub form_status: Status,
    pub input_title: String,
    pub input_description: String,
    pub input_due_date: String,
    pub input_priority: String,
    pub input_source_url: String,

    // Dashboard
    pub selected: usize,
    pub detail: Option<Task>,
    pub completed_tasks: Vec<Task>,
    pub completed_loading: bool,

    pub notice: Option<Notice>,
    pub tick: u64,

    auth_events: Receiver<AuthEvent>,
    load_results: Receiver<(u64, ApiResult<Vec<Task>>)>,
    load_tx: Sender<(u64, ApiResult<Vec<Task>>)>,
    last_refetch: bool,
    guard_check_pending: bool,
}

impl App {
    pub fn new(
        config: ListoConfig,
        session: SessionStore,
        auth: AuthClient,
        auth_events: Receiver<AuthEvent>,
        api: TaskApi,
    ) -> Self {
        let (load_tx, load_results) = channel();
        // A remembered session goes straight to the dashboard; the guard
        // still has to confirm it before anything renders.
        let screen = if session.token().is_some() {
            Screen::Dashboard
        } else {
            Screen::Login
        };
        let remember_me = config.remember_email.is_some();
        let input_email = config.remember_email.clone().unwrap_or_default();
        let input_mode = if screen == Screen::Login {
            InputMode::LoginForm
        } else {
            InputMode::Normal
        };
        Self {
            config,
            session,
            auth,
            api,
            store: TaskStore::new(),
            guard: RouteGuard::new(),
            screen,
            input_mode,
            login_step: LoginStep::Email,
            input_email,
            input_password: String::new(),
            remember_me,
            login_notice: None,
            input_oauth_token: String::new(),
            register_step: RegisterStep::Name,
            input_name: String::new(),
            input_reg_email: String::new(),
            input_reg_password: String::new(),
            input_confirm_password: String::new(),
            form_step: TaskFormStep::Title,
            editing_task_id: None,
            form_status: Status::New,
            input_title: String::new(),
            input_description: String::new(),
            input_due_date: String::new(),
            input_priority: String::new(),
            input_source_url: String::new(),
            selected: 0,
            detail: None,
            completed_tasks: Vec::new(),
            completed_loading: false,
            notice: None,
            tick: 0,
            auth_events,
            load_results,
            load_tx,
            last_refetch: false,
            guard_check_pending: true,
        }
    }

    // ----- event plumbing ---------------------------------------------------

    /// Applies queued auth-state changes from the identity provider.
    pub fn drain_auth_events(&mut self) {
        let events: Vec<AuthEvent> = self.auth_events.try_iter().collect();
        for event in events {
            if self.session.apply_event(&event) == SessionSignal::SignedOut {
                self.go_to_login("signed_out");
            }
        }
    }

    /// Starts a list load on a worker thread; the result comes back through
    /// `drain_load_results` with its ticket so stale answers get dropped.
    pub fn spawn_load(&mut self) {
        let seq = self.store.begin_load();
        let api = self.api.clone();
        let tx = self.load_tx.clone();
        thread::spawn(move || {
            tx.send((seq, api.list())).ok();
        });
    }

    pub fn drain_load_results(&mut self) {
        let results: Vec<(u64, ApiResult<Vec<Task>>)> = self.load_results.try_iter().collect();
        for (seq, result) in results {
            let unauthorized = matches!(result, Err(ApiError::Unauthorized));
            self.store.finish_load(seq, result);
            if unauthorized {
                // Anything still in flight belongs to the dead session.
                self.force_relogin("session_expired");
                return;
            }
        }
        // Keep the cursor on the list after a reload shrank it.
        let rows = self.store.filtered_list().len();
        if rows == 0 {
            self.selected = 0;
        } else if self.selected >= rows {
            self.selected = rows - 1;
        }
    }

    /// Watches the refetch flip-flag; one flip means one reload.
    pub fn poll_refetch(&mut self) -> bool {
        if self.store.refetch() != self.last_refetch {
            self.last_refetch = self.store.refetch();
            return true;
        }
        false
    }

    // ----- route guarding ---------------------------------------------------

    /// Runs the auth check for the protected screens. Provider failures wait
    /// for a manual retry instead of hammering the provider every tick.
    pub fn guard_tick(&mut self) {
        if !matches!(self.screen, Screen::Dashboard | Screen::Completed) {
            return;
        }
        if self.guard.state() != GuardState::Checking || !self.guard_check_pending {
            return;
        }
        let was_first = !self.guard.can_retry();
        match self.guard.resolve(&self.session, &self.auth) {
            GuardState::Authenticated => {
                self.enter_dashboard();
            }
            GuardState::Unauthenticated => {
                self.go_to_login("auth_failed");
            }
            GuardState::Checking => {
                if self.guard.can_retry() {
                    // Surface once, then wait for the user.
                    self.guard_check_pending = false;
                    if was_first {
                        let detail = self
                            .guard
                            .last_error()
                            .unwrap_or("Could not reach the auth service")
                            .to_string();
                        self.set_error(&format!("{} - press r to retry", detail));
                    }
                }
            }
        }
    }

    pub fn retry_auth_check(&mut self) {
        self.guard_check_pending = true;
    }

    /// Rotates the bearer token on a long interval, the way the hosted auth
    /// SDKs do. The refreshed session comes back through the event stream;
    /// failures are ignored (the next 401 forces a re-login anyway).
    pub fn refresh_tick(&mut self) {
        if !matches!(self.screen, Screen::Dashboard | Screen::Completed) {
            return;
        }
        if self.guard.state() != GuardState::Authenticated {
            return;
        }
        // ~45 minutes of 100ms ticks
        if self.tick % 27_000 != 0 {
            return;
        }
        let _ = self.auth.refresh_session();
    }

    // ----- navigation -------------------------------------------------------

    fn enter_dashboard(&mut self) {
        self.screen = Screen::Dashboard;
        self.input_mode = InputMode::Normal;
        self.store.clear_selection();
        self.selected = 0;
        self.spawn_load();
    }

    pub fn go_to_login(&mut self, reason: &str) {
        self.screen = Screen::Login;
        self.input_mode = InputMode::LoginForm;
        self.login_step = LoginStep::Email;
        self.login_notice = Some(reason.to_string());
        self.input_password.clear();
        self.input_oauth_token.clear();
        self.detail = None;
        self.guard.reset();
        self.guard_check_pending = true;
        self.store = TaskStore::new();
        self.last_refetch = false;
    }

    /// The cross-cutting half of the error taxonomy: a 401 anywhere kills
    /// the session and lands on the login screen with a reason.
    fn force_relogin(&mut self, reason: &str) {
        self.session.clear();
        self.go_to_login(reason);
        self.set_error("Session expired - please login again");
    }

    pub fn handle_api_error(&mut self, err: ApiError) {
        match err {
            ApiError::Unauthorized => self.force_relogin("session_expired"),
            err if err.is_connectivity() => {
                self.set_error("Connection problem - check your network and try again")
            }
            other => self.set_error(&other.to_string()),
        }
    }

    pub fn set_error(&mut self, msg: &str) {
        self.notice = Some(Notice::Error(msg.to_string()));
    }

    pub fn set_info(&mut self, msg: &str) {
        self.notice = Some(Notice::Info(msg.to_string()));
    }

    // ----- login / register -------------------------------------------------

    pub fn submit_login(&mut self) {
        match self.login_step {
            LoginStep::Email => {
                if self.input_email.trim().is_empty() {
                    self.set_error("Email is required");
                    return;
                }
                self.login_step = LoginStep::Password;
            }
            LoginStep::Password => {
                let email = self.input_email.trim().to_string();
                let password = self.input_password.clone();
                match self.auth.sign_in_with_password(&email, &password) {
                    Ok(provider_session) => {
                        self.remember_email_choice(&email);
                        self.session
                            .set_session(StoredSession::from(&provider_session), self.remember_me);
                        self.login_notice = None;
                        self.notice = None;
                        self.input_password.clear();
                        self.guard.reset();
                        self.guard_check_pending = true;
                        self.screen = Screen::Dashboard;
                        self.input_mode = InputMode::Normal;
                    }
                    Err(err) => {
                        self.input_password.clear();
                        self.set_error(&login_error_message(&err));
                    }
                }
            }
        }
    }

    fn remember_email_choice(&mut self, email: &str) {
        let wanted = if self.remember_me {
            Some(email.to_string())
        } else {
            None
        };
        if self.config.remember_email == wanted {
            return;
        }
        self.config.remember_email = wanted;
        if let Err(e) = config::save_config(&self.config) {
            eprintln!("{}", e);
        }
    }

    /// Returns the URL to open in a browser; the token comes back by paste.
    pub fn start_oauth(&mut self) -> Option<String> {
        match self.auth.sign_in_with_oauth("google") {
            Ok(url) => {
                self.input_oauth_token.clear();
                self.input_mode = InputMode::OAuthToken;
                self.set_info("Finish the login in your browser, then paste the access token here");
                Some(url)
            }
            Err(err) => {
                self.handle_api_error(err);
                None
            }
        }
    }

    pub fn submit_oauth_token(&mut self) {
        let pasted = self.input_oauth_token.clone();
        match self.auth.complete_oauth(&pasted) {
            Ok(provider_session) => {
                self.session
                    .set_session(StoredSession::from(&provider_session), self.remember_me);
                self.input_oauth_token.clear();
                self.login_notice = None;
                self.notice = None;
                self.guard.reset();
                self.guard_check_pending = true;
                self.screen = Screen::Dashboard;
                self.input_mode = InputMode::Normal;
            }
            Err(err) => {
                self.session.clear();
                self.login_notice = Some("auth_failed".to_string());
                self.set_error(&err.to_string());
                self.input_mode = InputMode::LoginForm;
            }
        }
    }

    pub fn start_register(&mut self) {
        self.screen = Screen::Register;
        self.input_mode = InputMode::RegisterForm;
        self.register_step = RegisterStep::Name;
        self.input_name.clear();
        self.input_reg_email.clear();
        self.input_reg_password.clear();
        self.input_confirm_password.clear();
        self.notice = None;
    }

    pub fn submit_register(&mut self) {
        match self.register_step {
            RegisterStep::Name => {
                if self.input_name.trim().is_empty() {
                    self.set_error("Name is required");
                    return;
                }
                self.register_step = RegisterStep::Email;
            }
            RegisterStep::Email => {
                if !self.input_reg_email.contains('@') {
                    self.set_error("Enter a valid email");
                    return;
                }
                self.register_step = RegisterStep::Password;
            }
            RegisterStep::Password => {
                if self.input_reg_password.chars().count() < 6 {
                    self.set_error("Password must have at least 6 characters");
                    return;
                }
                self.register_step = RegisterStep::ConfirmPassword;
            }
            RegisterStep::ConfirmPassword => {
                if self.input_confirm_password != self.input_reg_password {
                    self.set_error("Passwords do not match");
                    self.input_confirm_password.clear();
                    return;
                }
                let name = self.input_name.trim().to_string();
                let email = self.input_reg_email.trim().to_string();
                match self.api.register(&name, &email, &self.input_reg_password) {
                    Ok(()) => {
                        self.set_info("Account created - you can login now");
                        self.screen = Screen::Login;
                        self.input_mode = InputMode::LoginForm;
                        self.login_step = LoginStep::Email;
                        self.input_email = email;
                    }
                    Err(err) => self.handle_api_error(err),
                }
            }
        }
    }

    pub fn logout(&mut self) {
        if let Err(err) = self.auth.sign_out() {
            self.handle_api_error(err);
        }
        // The signed-out event lands in drain_auth_events, which clears the
        // session and navigates.
    }

    // ----- task form --------------------------------------------------------

    pub fn begin_create(&mut self) {
        self.editing_task_id = None;
        self.form_status = Status::New;
        self.input_title.clear();
        self.input_description.clear();
        self.input_due_date.clear();
        self.input_priority.clear();
        self.input_source_url.clear();
        self.form_step = TaskFormStep::Title;
        self.input_mode = InputMode::TaskForm;
        self.notice = None;
    }

    pub fn begin_edit(&mut self) {
        let Some(task) = self.store.selected_task().cloned() else {
            self.set_error("Select a task first (Space)");
            return;
        };
        self.editing_task_id = Some(task.id.clone());
        self.form_status = task.status;
        self.input_title = task.title;
        self.input_description = task.description;
        self.input_due_date = task.due_date.unwrap_or_default();
        self.input_priority = task.priority.label().to_lowercase();
        self.input_source_url = task.source_url.unwrap_or_default();
        self.form_step = TaskFormStep::Title;
        self.input_mode = InputMode::TaskForm;
        self.notice = None;
    }

    /// Advances through the form fields; the last step submits.
    pub fn submit_task_form(&mut self) {
        self.form_step = match self.form_step {
            TaskFormStep::Title => TaskFormStep::Description,
            TaskFormStep::Description => TaskFormStep::DueDate,
            TaskFormStep::DueDate => TaskFormStep::Priority,
            TaskFormStep::Priority => TaskFormStep::SourceUrl,
            TaskFormStep::SourceUrl => {
                self.finish_task_form();
                return;
            }
        };
    }

    fn finish_task_form(&mut self) {
        let due_date = if self.input_due_date.trim().is_empty() {
            None
        } else {
            match parse_due_date(&self.input_due_date) {
                Ok(date) => Some(date),
                Err(e) => {
                    self.form_step = TaskFormStep::DueDate;
                    self.set_error(&e);
                    return;
                }
            }
        };
        let priority = if self.input_priority.trim().is_empty() {
            Priority::Medium
        } else {
            match Priority::parse(&self.input_priority) {
                Some(p) => p,
                None => {
                    self.form_step = TaskFormStep::Priority;
                    self.set_error("Priority is 1-4 or low/medium/high/urgent");
                    return;
                }
            }
        };
        let source_url = {
            let url = self.input_source_url.trim();
            if url.is_empty() {
                None
            } else {
                Some(url.to_string())
            }
        };
        let payload = TaskPayload {
            title: self.input_title.trim().to_string(),
            description: self.input_description.trim().to_string(),
            status: self.form_status,
            priority,
            due_date,
            source_url,
        };
        if let Err(err) = payload.validate() {
            self.form_step = TaskFormStep::Title;
            self.set_error(&err.to_string());
            return;
        }

        let result = match self.editing_task_id.clone() {
            Some(id) => self
                .store
                .update_and_refresh(&self.api, &payload, &id)
                .map(|_| "Task updated"),
            None => self
                .store
                .create_and_refresh(&self.api, &payload)
                .map(|_| "Task created"),
        };
        match result {
            Ok(msg) => {
                self.set_info(msg);
                self.input_mode = InputMode::Normal;
                self.editing_task_id = None;
            }
            Err(err) => self.handle_api_error(err),
        }
    }

    // ----- dashboard actions ------------------------------------------------

    /// Id of the task under the cursor in the filtered view.
    pub fn cursor_task_id(&self) -> Option<String> {
        self.store
            .filtered_list()
            .get(self.selected)
            .map(|t| t.id.clone())
    }

    pub fn toggle_select_cursor(&mut self) {
        if let Some(id) = self.cursor_task_id() {
            self.store.select(&id);
        }
    }

    pub fn complete_selected(&mut self) {
        let Some(id) = self.store.selected().map(|s| s.to_string()) else {
            self.set_error("Select a task first (Space)");
            return;
        };
        match self.store.complete_and_refresh(&self.api, &id) {
            Ok(_) => {
                self.set_info("Task completed");
            }
            Err(err) => self.handle_api_error(err),
        }
    }

    pub fn delete_selected(&mut self) {
        let Some(id) = self.store.selected().map(|s| s.to_string()) else {
            self.set_error("Select a task first (Space)");
            return;
        };
        match self.store.delete_and_refresh(&self.api, &id) {
            Ok(()) => {
                self.set_info("Task deleted");
            }
            Err(err) => self.handle_api_error(err),
        }
    }

    pub fn open_detail(&mut self) {
        let Some(id) = self.cursor_task_id() else {
            return;
        };
        match self.api.get_by_id(&id) {
            Ok(task) => {
                self.detail = Some(task);
                self.input_mode = InputMode::ViewingTask;
            }
            Err(err) => self.handle_api_error(err),
        }
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
        self.input_mode = InputMode::Normal;
    }

    pub fn show_completed(&mut self) {
        self.screen = Screen::Completed;
        self.load_completed();
    }

    pub fn show_dashboard(&mut self) {
        self.screen = Screen::Dashboard;
        self.store.trigger_refetch();
    }

    pub fn load_completed(&mut self) {
        self.completed_loading = true;
        match self.api.list_completed() {
            Ok(tasks) => {
                self.completed_tasks = tasks;
                self.completed_loading = false;
            }
            Err(err) => {
                self.completed_loading = false;
                self.handle_api_error(err);
            }
        }
    }

    /// The source link of the selected (or cursor) task, if it has one.
    pub fn source_url_to_open(&self) -> Option<String> {
        let task = self
            .store
            .selected_task()
            .or_else(|| self.store.filtered_list().get(self.selected));
        task.and_then(|t| t.source_url.clone())
    }
}

fn login_error_message(err: &ApiError) -> String {
    match err {
        ApiError::AuthProvider(msg) if msg == "Invalid login credentials" => {
            "Email or password incorrect".to_string()
        }
        ApiError::AuthProvider(msg) if msg == "Email not confirmed" => {
            "Email not confirmed - check your inbox".to_string()
        }
        ApiError::Network(_) => "Could not reach the auth service".to_string(),
        other => other.to_string(),
    }
}
