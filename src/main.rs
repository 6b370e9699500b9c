// main.rs

mod api;
mod app;
mod auth;
mod config;
mod daemon;
mod error;
mod guard;
mod session;
mod store;
mod task;
mod tui;

use crate::api::TaskApi;
use crate::app::App;
use crate::auth::AuthClient;
use crate::session::SessionStore;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load_config();

    let session = SessionStore::open(config::config_dir().join("session.json"));
    session.hydrate();

    let (auth, auth_events) = AuthClient::new(&cfg.auth_url, session.clone());
    let api = TaskApi::new(&cfg.api_url, session.clone())?;

    // Due-date reminders run on their own thread with their own transport.
    let daemon_api = api.clone();
    std::thread::spawn(move || {
        if let Err(e) = daemon::start_daemon(daemon_api) {
            eprintln!("Daemon error: {}", e);
        }
    });

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(cfg, session, auth, auth_events, api);

    // Run the TUI event loop (blocks until exit)
    let res = tui::run_app(&mut terminal, &mut app);

    // Restore terminal state
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Handle errors from the event loop if any
    if let Err(err) = res {
        eprintln!("Application error: {}", err);
    }

    Ok(())
}
