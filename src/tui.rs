// tui.rs

use crate::app::{App, InputMode, LoginStep, Notice, RegisterStep, Screen, TaskFormStep};
use crate::guard::GuardState;
use crate::task::{Priority, Status, Task};
use chrono::{Datelike, Duration as Dur, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    Terminal,
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use std::io::Write;
use std::process::{Command, Stdio};
use std::{io, time::Duration};
use textwrap::wrap;

pub fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()>
where
    std::io::Error: From<<B as Backend>::Error>,
{
    loop {
        app.tick = app.tick.wrapping_add(1);
        // Inbound updates first: provider events, finished loads, refetch
        // flips, then the auth check for the protected screens.
        app.drain_auth_events();
        app.drain_load_results();
        if app.poll_refetch() {
            app.spawn_load();
        }
        app.guard_tick();
        app.refresh_tick();

        terminal.draw(|f| ui(f, app))?;

        if crossterm::event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q'))
                {
                    return Ok(());
                }

                match app.input_mode {
                    // Until the session check resolves, the protected screens
                    // only react to quit, retry and logout.
                    InputMode::Normal if app.guard.state() != GuardState::Authenticated => {
                        match key.code {
                            KeyCode::Char('q') => return Ok(()),
                            KeyCode::Char('r') => {
                                if app.guard.can_retry() {
                                    app.retry_auth_check();
                                }
                            }
                            KeyCode::Char('L') => app.logout(),
                            _ => {}
                        }
                    }
                    InputMode::Normal => match key.code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Tab => {
                            if app.screen == Screen::Dashboard {
                                app.show_completed();
                            } else {
                                app.show_dashboard();
                            }
                        }
                        KeyCode::Down => {
                            let rows = if app.screen == Screen::Dashboard {
                                app.store.filtered_list().len()
                            } else {
                                app.completed_tasks.len()
                            };
                            if app.selected < rows.saturating_sub(1) {
                                app.selected += 1;
                            }
                        }
                        KeyCode::Up => {
                            if app.selected > 0 {
                                app.selected -= 1;
                            }
                        }
                        KeyCode::Char(' ') if app.screen == Screen::Dashboard => {
                            app.toggle_select_cursor();
                        }
                        KeyCode::Char('a') if app.screen == Screen::Dashboard => {
                            app.begin_create();
                        }
                        KeyCode::Char('e') if app.screen == Screen::Dashboard => {
                            app.begin_edit();
                        }
                        KeyCode::Char('d') if app.screen == Screen::Dashboard => {
                            app.complete_selected();
                        }
                        // Delete needs Shift+R, same as the old delete binding.
                        KeyCode::Char('r') | KeyCode::Char('R')
                            if key.modifiers.contains(KeyModifiers::SHIFT)
                                && app.screen == Screen::Dashboard =>
                        {
                            app.delete_selected();
                        }
                        KeyCode::Enter if app.screen == Screen::Dashboard => {
                            app.open_detail();
                        }
                        KeyCode::Char('?') if app.screen == Screen::Dashboard => {
                            app.input_mode = InputMode::Searching;
                            app.store.apply_filter("");
                        }
                        KeyCode::Char('c') if app.screen == Screen::Dashboard => {
                            if let Some(task) =
                                app.store.filtered_list().get(app.selected).cloned()
                            {
                                match copy_to_clipboard(&task.title) {
                                    Ok(()) => app.set_info("Copied task title to clipboard"),
                                    Err(e) => app.set_error(&format!("Copy failed: {}", e)),
                                }
                            }
                        }
                        KeyCode::Char('o') => {
                            if let Some(url) = app.source_url_to_open() {
                                if let Err(e) = open_in_browser(&url) {
                                    app.set_error(&format!("Open link failed: {}", e));
                                }
                            } else {
                                app.set_error("Task has no source link");
                            }
                        }
                        KeyCode::Char('r') => {
                            if app.guard.can_retry() {
                                app.retry_auth_check();
                            } else if app.screen == Screen::Completed {
                                app.load_completed();
                            } else {
                                app.store.trigger_refetch();
                            }
                        }
                        KeyCode::Char('L') => {
                            app.logout();
                        }
                        _ => {}
                    },
                    InputMode::LoginForm => match key.code {
                        KeyCode::Enter => app.submit_login(),
                        KeyCode::Up => app.login_step = LoginStep::Email,
                        KeyCode::Down => app.login_step = LoginStep::Password,
                        KeyCode::Esc => {
                            app.notice = None;
                        }
                        KeyCode::Char('r') | KeyCode::Char('R')
                            if key.modifiers.contains(KeyModifiers::CONTROL) =>
                        {
                            app.remember_me = !app.remember_me;
                        }
                        KeyCode::Char('o') | KeyCode::Char('O')
                            if key.modifiers.contains(KeyModifiers::CONTROL) =>
                        {
                            if let Some(url) = app.start_oauth() {
                                if let Err(e) = open_in_browser(&url) {
                                    app.set_error(&format!("Open browser failed: {}", e));
                                }
                            }
                        }
                        KeyCode::Char('n') | KeyCode::Char('N')
                            if key.modifiers.contains(KeyModifiers::CONTROL) =>
                        {
                            app.start_register();
                        }
                        KeyCode::Char('v') | KeyCode::Char('V')
                            if key.modifiers.contains(KeyModifiers::CONTROL) =>
                        {
                            match paste_from_clipboard() {
                                Ok(text) => login_input_mut(app).push_str(text.trim_end()),
                                Err(e) => app.set_error(&format!("Paste failed: {}", e)),
                            }
                        }
                        KeyCode::Char(c) => login_input_mut(app).push(c),
                        KeyCode::Backspace => {
                            login_input_mut(app).pop();
                        }
                        _ => {}
                    },
                    InputMode::OAuthToken => match key.code {
                        KeyCode::Enter => app.submit_oauth_token(),
                        KeyCode::Esc => {
                            app.input_oauth_token.clear();
                            app.input_mode = InputMode::LoginForm;
                        }
                        KeyCode::Char('v') | KeyCode::Char('V')
                            if key.modifiers.contains(KeyModifiers::CONTROL) =>
                        {
                            match paste_from_clipboard() {
                                Ok(text) => app.input_oauth_token.push_str(text.trim_end()),
                                Err(e) => app.set_error(&format!("Paste failed: {}", e)),
                            }
                        }
                        KeyCode::Char(c) => app.input_oauth_token.push(c),
                        KeyCode::Backspace => {
                            app.input_oauth_token.pop();
                        }
                        _ => {}
                    },
                    InputMode::RegisterForm => match key.code {
                        KeyCode::Enter => app.submit_register(),
                        KeyCode::Esc => {
                            app.screen = Screen::Login;
                            app.input_mode = InputMode::LoginForm;
                        }
                        KeyCode::Up => app.register_step = prev_register_step(app.register_step),
                        KeyCode::Down => app.register_step = next_register_step(app.register_step),
                        KeyCode::Char(c) => register_input_mut(app).push(c),
                        KeyCode::Backspace => {
                            register_input_mut(app).pop();
                        }
                        _ => {}
                    },
                    InputMode::TaskForm => match key.code {
                        KeyCode::Enter => app.submit_task_form(),
                        KeyCode::Esc => {
                            app.input_mode = InputMode::Normal;
                            app.editing_task_id = None;
                        }
                        KeyCode::Up if app.form_step == TaskFormStep::Priority => {
                            let current =
                                Priority::parse(&app.input_priority).unwrap_or(Priority::Medium);
                            app.input_priority = current.next().label().to_lowercase();
                        }
                        KeyCode::Down if app.form_step == TaskFormStep::Priority => {
                            let current =
                                Priority::parse(&app.input_priority).unwrap_or(Priority::Medium);
                            app.input_priority = current.prev().label().to_lowercase();
                        }
                        KeyCode::Char('v') | KeyCode::Char('V')
                            if key.modifiers.contains(KeyModifiers::CONTROL) =>
                        {
                            match paste_from_clipboard() {
                                Ok(text) => task_form_input_mut(app).push_str(text.trim_end()),
                                Err(e) => app.set_error(&format!("Paste failed: {}", e)),
                            }
                        }
                        KeyCode::Char(c) => task_form_input_mut(app).push(c),
                        KeyCode::Backspace => {
                            task_form_input_mut(app).pop();
                        }
                        _ => {}
                    },
                    InputMode::Searching => match key.code {
                        KeyCode::Enter | KeyCode::Esc => {
                            app.input_mode = InputMode::Normal;
                        }
                        KeyCode::Char(c) => {
                            let mut query = app.store.search_input().to_string();
                            query.push(c);
                            app.store.apply_filter(&query);
                            app.selected = 0;
                        }
                        KeyCode::Backspace => {
                            let mut query = app.store.search_input().to_string();
                            query.pop();
                            app.store.apply_filter(&query);
                            app.selected = 0;
                        }
                        _ => {}
                    },
                    InputMode::ViewingTask => match key.code {
                        KeyCode::Esc | KeyCode::Enter => app.close_detail(),
                        KeyCode::Char('o') => {
                            let url = app.detail.as_ref().and_then(|t| t.source_url.clone());
                            if let Some(url) = url {
                                if let Err(e) = open_in_browser(&url) {
                                    app.set_error(&format!("Open link failed: {}", e));
                                }
                            }
                        }
                        _ => {}
                    },
                }
            }
        }
    }
}

fn login_input_mut(app: &mut App) -> &mut String {
    match app.login_step {
        LoginStep::Email => &mut app.input_email,
        LoginStep::Password => &mut app.input_password,
    }
}

fn register_input_mut(app: &mut App) -> &mut String {
    match app.register_step {
        RegisterStep::Name => &mut app.input_name,
        RegisterStep::Email => &mut app.input_reg_email,
        RegisterStep::Password => &mut app.input_reg_password,
        RegisterStep::ConfirmPassword => &mut app.input_confirm_password,
    }
}

fn task_form_input_mut(app: &mut App) -> &mut String {
    match app.form_step {
        TaskFormStep::Title => &mut app.input_title,
        TaskFormStep::Description => &mut app.input_description,
        TaskFormStep::DueDate => &mut app.input_due_date,
        TaskFormStep::Priority => &mut app.input_priority,
        TaskFormStep::SourceUrl => &mut app.input_source_url,
    }
}

fn next_register_step(step: RegisterStep) -> RegisterStep {
    match step {
        RegisterStep::Name => RegisterStep::Email,
        RegisterStep::Email => RegisterStep::Password,
        RegisterStep::Password => RegisterStep::ConfirmPassword,
        RegisterStep::ConfirmPassword => RegisterStep::ConfirmPassword,
    }
}

fn prev_register_step(step: RegisterStep) -> RegisterStep {
    match step {
        RegisterStep::Name => RegisterStep::Name,
        RegisterStep::Email => RegisterStep::Name,
        RegisterStep::Password => RegisterStep::Email,
        RegisterStep::ConfirmPassword => RegisterStep::Password,
    }
}

fn loading_dots(tick: u64) -> String {
    ".".repeat(((tick / 3) % 4) as usize)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn ui(f: &mut ratatui::Frame<'_>, app: &App) {
    let size = f.area();
    match app.screen {
        Screen::Login => draw_login(f, app),
        Screen::Register => draw_register(f, app),
        Screen::Dashboard | Screen::Completed => draw_tasks(f, app),
    }

    // Status line at the very bottom, shared by every screen.
    if let Some(ref notice) = app.notice {
        let (text, style) = match notice {
            Notice::Info(msg) => (
                msg.as_str(),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Notice::Error(msg) => (
                msg.as_str(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
        };
        let line = Paragraph::new(text).style(style).alignment(Alignment::Center);
        let area = ratatui::layout::Rect {
            x: size.x,
            y: size.height.saturating_sub(2),
            width: size.width,
            height: 1,
        };
        f.render_widget(line, area);
    }
}

fn field_line<'a>(label: &'a str, value: String, active: bool) -> Line<'a> {
    let text = if active {
        format!("{}|", value)
    } else {
        value
    };
    let style = if active {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    Line::from(vec![
        Span::styled(format!("{:<12}", label), Style::default().fg(Color::Cyan)),
        Span::styled(text, style),
    ])
}

fn login_reason_text(code: &str) -> &'static str {
    match code {
        "session_expired" => "Your session expired",
        "auth_failed" => "Authentication failed",
        "signed_out" => "You have been signed out",
        _ => "Please login",
    }
}

fn draw_login(f: &mut ratatui::Frame<'_>, app: &App) {
    let size = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // banner
            Constraint::Length(1), // reason
            Constraint::Length(8), // form
            Constraint::Length(4), // oauth paste field
            Constraint::Min(1),    // help
        ])
        .split(size);

    let banner = Paragraph::new(Line::from(Span::styled(
        "Listo - your task manager",
        Style::default().add_modifier(Modifier::BOLD),
    )))
    .block(Block::default().borders(Borders::ALL))
    .alignment(Alignment::Center);
    f.render_widget(banner, chunks[0]);

    if let Some(ref code) = app.login_notice {
        let reason = Paragraph::new(login_reason_text(code))
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center);
        f.render_widget(reason, chunks[1]);
    }

    let in_form = app.input_mode == InputMode::LoginForm;
    let masked = "*".repeat(app.input_password.chars().count());
    let lines = vec![
        field_line(
            "Email",
            app.input_email.clone(),
            in_form && app.login_step == LoginStep::Email,
        ),
        field_line(
            "Password",
            masked,
            in_form && app.login_step == LoginStep::Password,
        ),
        Line::from(""),
        Line::from(format!(
            "[{}] Remember me (Ctrl+r)",
            if app.remember_me { "x" } else { " " }
        )),
    ];
    let form = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("| Login |"))
        .wrap(Wrap { trim: true });
    f.render_widget(form, chunks[2]);

    if app.input_mode == InputMode::OAuthToken {
        let caret = format!("{}|", app.input_oauth_token);
        let paste = Paragraph::new(caret)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Paste access token (Ctrl+v)"),
            )
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .wrap(Wrap { trim: true });
        f.render_widget(paste, chunks[3]);
    }

    let b = Style::default().add_modifier(Modifier::BOLD);
    let help = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Enter", b),
            Span::raw(" next/login, "),
            Span::styled("Up/Down", b),
            Span::raw(" switch field, "),
            Span::styled("Ctrl+o", b),
            Span::raw(" Google login, "),
            Span::styled("Ctrl+n", b),
            Span::raw(" register, "),
            Span::styled("Ctrl+q", b),
            Span::raw(" quit"),
        ]),
    ])
    .alignment(Alignment::Center);
    f.render_widget(help, chunks[4]);
}

fn draw_register(f: &mut ratatui::Frame<'_>, app: &App) {
    let size = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(8),
            Constraint::Min(1),
        ])
        .split(size);

    let banner = Paragraph::new(Line::from(Span::styled(
        "Create your Listo account",
        Style::default().add_modifier(Modifier::BOLD),
    )))
    .block(Block::default().borders(Borders::ALL))
    .alignment(Alignment::Center);
    f.render_widget(banner, chunks[0]);

    let masked_pw = "*".repeat(app.input_reg_password.chars().count());
    let masked_confirm = "*".repeat(app.input_confirm_password.chars().count());
    let lines = vec![
        field_line(
            "Full name",
            app.input_name.clone(),
            app.register_step == RegisterStep::Name,
        ),
        field_line(
            "Email",
            app.input_reg_email.clone(),
            app.register_step == RegisterStep::Email,
        ),
        field_line(
            "Password",
            masked_pw,
            app.register_step == RegisterStep::Password,
        ),
        field_line(
            "Confirm",
            masked_confirm,
            app.register_step == RegisterStep::ConfirmPassword,
        ),
    ];
    let form = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("| Register |"))
        .wrap(Wrap { trim: true });
    f.render_widget(form, chunks[1]);

    let b = Style::default().add_modifier(Modifier::BOLD);
    let help = Paragraph::new(Line::from(vec![
        Span::styled("Enter", b),
        Span::raw(" next/submit, "),
        Span::styled("Up/Down", b),
        Span::raw(" switch field, "),
        Span::styled("Esc", b),
        Span::raw(" back to login"),
    ]))
    .alignment(Alignment::Center);
    f.render_widget(help, chunks[2]);
}

fn draw_tasks(f: &mut ratatui::Frame<'_>, app: &App) {
    let size = f.area();

    // The guard blocks the protected screens until the session check is
    // done; nothing task-related renders before that.
    if app.guard.state() == GuardState::Checking {
        let mut lines = vec![
            Line::from(""),
            Line::from(format!("Checking your session{}", loading_dots(app.tick))),
        ];
        if app.guard.can_retry() {
            lines.push(Line::from(""));
            lines.push(Line::from("Auth service unreachable - press r to retry"));
        }
        let panel = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("| Listo |"))
            .alignment(Alignment::Center);
        f.render_widget(panel, size);
        return;
    }

    if app.input_mode == InputMode::ViewingTask {
        draw_task_detail(f, app);
        return;
    }

    let mut constraints = vec![
        Constraint::Length(1), // tabs
        Constraint::Length(3), // title
        Constraint::Length(3), // help
        Constraint::Min(1),    // task list
    ];
    let needs_input = matches!(app.input_mode, InputMode::TaskForm | InputMode::Searching);
    if needs_input {
        constraints.push(Constraint::Length(3));
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints(constraints)
        .split(size);

    let active = Style::default()
        .fg(Color::White)
        .bg(Color::Blue)
        .add_modifier(Modifier::BOLD);
    let inactive = Style::default();
    let (tasks_style, done_style) = if app.screen == Screen::Dashboard {
        (active, inactive)
    } else {
        (inactive, active)
    };
    let tabs_line = Line::from(vec![
        Span::styled(" Tasks ", tasks_style),
        Span::raw(" "),
        Span::styled(" Completed ", done_style),
    ]);
    let tabs = Paragraph::new(tabs_line).alignment(Alignment::Left);
    f.render_widget(tabs, chunks[0]);

    let who = app
        .session
        .user_email()
        .unwrap_or_else(|| "your tasks".to_string());
    let title = Paragraph::new(Line::from(Span::styled(
        format!("Listo - {}", who),
        Style::default().add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center);
    f.render_widget(title, chunks[1]);

    let b = Style::default().add_modifier(Modifier::BOLD);
    let help = Paragraph::new(vec![
        Line::from(vec![
            Span::raw("Press "),
            Span::styled("a", b),
            Span::raw(" add, "),
            Span::styled("e", b),
            Span::raw(" edit, "),
            Span::styled("Space", b),
            Span::raw(" select, "),
            Span::styled("d", b),
            Span::raw(" complete, "),
            Span::raw("Shift+"),
            Span::styled("R", b),
            Span::raw(" delete, "),
            Span::styled("Enter", b),
            Span::raw(" details"),
        ]),
        Line::from(vec![
            Span::styled("?", b),
            Span::raw(" search, "),
            Span::styled("r", b),
            Span::raw(" reload, "),
            Span::styled("Tab", b),
            Span::raw(" completed, "),
            Span::styled("o", b),
            Span::raw(" open link, "),
            Span::styled("c", b),
            Span::raw(" copy, "),
            Span::styled("L", b),
            Span::raw(" logout, "),
            Span::styled("q", b),
            Span::raw(" quit"),
        ]),
    ])
    .alignment(Alignment::Center);
    f.render_widget(help, chunks[2]);

    let loading = if app.screen == Screen::Dashboard {
        app.store.is_loading()
    } else {
        app.completed_loading
    };
    if loading {
        let panel = Paragraph::new(format!("Loading your tasks{}", loading_dots(app.tick)))
            .block(Block::default().borders(Borders::ALL).title("| Tasks |"))
            .alignment(Alignment::Center);
        f.render_widget(panel, chunks[3]);
    } else if app.screen == Screen::Dashboard {
        draw_task_list(f, app, chunks[3]);
    } else {
        draw_completed_list(f, app, chunks[3]);
    }

    if needs_input {
        let last = chunks.len() - 1;
        let caret = "|";
        let style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
        if app.input_mode == InputMode::Searching {
            let query = app.store.search_input();
            let text = if query.is_empty() {
                caret.to_string()
            } else {
                format!("{}{}", query, caret)
            };
            let widget = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title("Search"))
                .style(style)
                .wrap(Wrap { trim: true });
            f.render_widget(widget, chunks[last]);
        } else {
            let (title, value) = match app.form_step {
                TaskFormStep::Title => ("Title", &app.input_title),
                TaskFormStep::Description => ("Description", &app.input_description),
                TaskFormStep::DueDate => {
                    ("Due date (e.g. tomorrow, friday, 2025-12-01)", &app.input_due_date)
                }
                TaskFormStep::Priority => {
                    ("Priority (1-4 or low/medium/high/urgent, Up/Down)", &app.input_priority)
                }
                TaskFormStep::SourceUrl => ("Source link (optional)", &app.input_source_url),
            };
            let text = if value.is_empty() {
                caret.to_string()
            } else {
                format!("{}{}", value, caret)
            };
            let widget = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title(title))
                .style(style)
                .wrap(Wrap { trim: true });
            f.render_widget(widget, chunks[last]);
        }
    }
}

fn row_color(task: &Task) -> Color {
    match task.status {
        Status::Done | Status::Archived => Color::Green,
        Status::InProgress => Color::Cyan,
        Status::New => {
            if task.due_date.as_deref().map(is_overdue).unwrap_or(false) {
                Color::Red
            } else {
                Color::Yellow
            }
        }
    }
}

fn short_date(raw: &str) -> String {
    // Server timestamps are RFC 3339; show just the date part.
    raw.split('T').next().unwrap_or(raw).to_string()
}

fn draw_task_list(f: &mut ratatui::Frame<'_>, app: &App, area: ratatui::layout::Rect) {
    let inner_width = area.width.saturating_sub(2) as usize;

    let rows: Vec<ListItem> = app
        .store
        .filtered_list()
        .iter()
        .map(|task| {
            let mark = if app.store.selected() == Some(task.id.as_str()) {
                "[x]"
            } else {
                "[ ]"
            };
            let mut text = format!(
                "{} {} · {} · {}",
                mark,
                task.status.label(),
                task.priority.label(),
                task.title
            );
            if !task.description.is_empty() {
                text.push_str(&format!(" - {}", task.description));
            }
            if let Some(ref due) = task.due_date {
                text.push_str(&format!(" (Due: {})", short_date(due)));
            }
            text.push_str(&format!(" [Created: {}]", short_date(&task.created_at)));

            let color = row_color(task);
            let lines: Vec<Line> = wrap(&text, inner_width.max(10))
                .iter()
                .map(|w| Line::from(Span::styled(w.to_string(), Style::default().fg(color))))
                .collect();
            ListItem::new(lines)
        })
        .collect();

    let empty = rows.is_empty();
    let list = List::new(rows)
        .block(Block::default().borders(Borders::ALL).title("| Tasks |"))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    let mut state = ratatui::widgets::ListState::default();
    if !empty {
        state.select(Some(app.selected.min(app.store.filtered_list().len() - 1)));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_completed_list(f: &mut ratatui::Frame<'_>, app: &App, area: ratatui::layout::Rect) {
    let inner_width = area.width.saturating_sub(2) as usize;

    let rows: Vec<ListItem> = app
        .completed_tasks
        .iter()
        .map(|task| {
            let mut text = format!(
                "{} · {} · {}",
                task.status.label(),
                task.priority.label(),
                task.title
            );
            if let Some(done_at) = task.completed_at.as_deref().or(task.archived_at.as_deref()) {
                text.push_str(&format!(" [Completed: {}]", short_date(done_at)));
            }
            let lines: Vec<Line> = wrap(&text, inner_width.max(10))
                .iter()
                .map(|w| {
                    Line::from(Span::styled(
                        w.to_string(),
                        Style::default().fg(Color::Green),
                    ))
                })
                .collect();
            ListItem::new(lines)
        })
        .collect();

    let empty = rows.is_empty();
    let list = List::new(rows)
        .block(Block::default().borders(Borders::ALL).title("| Completed |"))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    let mut state = ratatui::widgets::ListState::default();
    if !empty {
        state.select(Some(app.selected.min(app.completed_tasks.len() - 1)));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_task_detail(f: &mut ratatui::Frame<'_>, app: &App) {
    let size = f.area();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([Constraint::Min(4), Constraint::Length(1)])
        .split(size);

    if let Some(ref task) = app.detail {
        let width = rows[0].width.saturating_sub(4) as usize;
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(Span::styled(
            format!("Id: {}", task.id),
            Style::default().fg(Color::Cyan),
        )));
        lines.push(Line::from(Span::styled(
            task.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(format!("Status: {}", task.status.label())));
        lines.push(Line::from(format!("Priority: {}", task.priority.label())));
        lines.push(Line::from(format!("Created: {}", short_date(&task.created_at))));
        lines.push(Line::from(format!("Updated: {}", short_date(&task.updated_at))));
        if let Some(ref due) = task.due_date {
            lines.push(Line::from(format!("Due: {}", short_date(due))));
        }
        if let Some(ref done_at) = task.completed_at {
            lines.push(Line::from(format!("Completed: {}", short_date(done_at))));
        }
        if let Some(ref url) = task.source_url {
            lines.push(Line::from(format!("Link: {}", url)));
        }
        if !task.description.is_empty() {
            lines.push(Line::from(""));
            for l in wrap(&task.description, width.max(10)) {
                lines.push(Line::from(format!("  {}", l)));
            }
        }
        let detail = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("| Task |"))
            .wrap(Wrap { trim: true });
        f.render_widget(detail, rows[0]);
    } else {
        let empty = Paragraph::new("No task loaded")
            .block(Block::default().borders(Borders::ALL).title("| Task |"));
        f.render_widget(empty, rows[0]);
    }

    let help = Paragraph::new(Line::from(vec![
        Span::raw("[Esc] Close  "),
        Span::raw("[o] Open link"),
    ]))
    .alignment(Alignment::Center);
    f.render_widget(help, rows[1]);
}

// ---------------------------------------------------------------------------
// Due date helpers
// ---------------------------------------------------------------------------

// Check if a due date string represents an overdue task
pub fn is_overdue(due_date_str: &str) -> bool {
    let now = Local::now();

    if let Ok(dt) = NaiveDateTime::parse_from_str(due_date_str, "%Y-%m-%d %H:%M") {
        if let Some(dt_local) = Local.from_local_datetime(&dt).single() {
            return dt_local < now;
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(due_date_str, "%Y-%m-%d") {
        return date < now.date_naive();
    }
    // RFC 3339 from the server
    if let Ok(date) = NaiveDate::parse_from_str(&short_date(due_date_str), "%Y-%m-%d") {
        return date < now.date_naive();
    }
    false
}

pub fn parse_due_date(input: &str) -> Result<String, String> {
    let input = input.trim().to_lowercase();
    let now = Local::now();
    let today = now.date_naive();

    if input.is_empty() {
        return Err("Please enter a due date".to_string());
    }

    let words: Vec<&str> = input.split_whitespace().collect();

    let raw_date = match words.as_slice() {
        ["now"] => Ok(now.format("%Y-%m-%d %H:%M").to_string()),

        ["today"] => Ok(today.format("%Y-%m-%d").to_string()),
        ["tomorrow"] | ["tmr"] => Ok((today + Dur::days(1)).format("%Y-%m-%d").to_string()),

        [day] if parse_weekday_name(day).is_some() => parse_weekday(day, today),
        ["next", day] if parse_weekday_name(day).is_some() => parse_next_weekday(day, today),

        ["week"] | ["next", "week"] => Ok((today + Dur::days(7)).format("%Y-%m-%d").to_string()),
        ["month"] | ["next", "month"] => Ok((today + Dur::days(30)).format("%Y-%m-%d").to_string()),

        ["in", num, unit] => parse_offset(num, unit, &now),

        [date_str, time_str] if looks_like_date(date_str) && looks_like_time(time_str) => {
            parse_date_time_combo(date_str, time_str)
        }

        [num, unit] => parse_offset(num, unit, &now),

        [single] => try_parse_date_or_time(single, today),

        _ => Err("Unrecognized due date format".to_string()),
    };

    raw_date.and_then(|date| validate_not_past(&date))
}

fn parse_weekday_name(s: &str) -> Option<Weekday> {
    match s {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn days_until_weekday(today: NaiveDate, target: Weekday) -> i64 {
    let current = today.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;
    let diff = (wanted - current).rem_euclid(7);
    if diff == 0 { 7 } else { diff }
}

fn parse_weekday(day: &str, today: NaiveDate) -> Result<String, String> {
    let target = parse_weekday_name(day).ok_or("Invalid weekday")?;
    let date = today + Dur::days(days_until_weekday(today, target));
    Ok(date.format("%Y-%m-%d").to_string())
}

fn parse_next_weekday(day: &str, today: NaiveDate) -> Result<String, String> {
    let target = parse_weekday_name(day).ok_or("Invalid weekday")?;
    let date = today + Dur::days(days_until_weekday(today, target) + 7);
    Ok(date.format("%Y-%m-%d").to_string())
}

fn parse_offset(num: &str, unit: &str, now: &chrono::DateTime<Local>) -> Result<String, String> {
    let n: i64 = num
        .parse()
        .map_err(|_| format!("Not a number: {}", num))?;
    if n < 0 {
        return Err("Offset must be positive".to_string());
    }
    let unit = unit.trim_end_matches('s');
    match unit {
        "hour" | "hr" | "h" => Ok((*now + Dur::hours(n)).format("%Y-%m-%d %H:%M").to_string()),
        "day" | "d" => Ok((now.date_naive() + Dur::days(n)).format("%Y-%m-%d").to_string()),
        "week" | "w" => Ok((now.date_naive() + Dur::days(7 * n)).format("%Y-%m-%d").to_string()),
        "month" => Ok((now.date_naive() + Dur::days(30 * n)).format("%Y-%m-%d").to_string()),
        _ => Err(format!("Unknown unit: {}", unit)),
    }
}

fn looks_like_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn looks_like_time(s: &str) -> bool {
    NaiveTime::parse_from_str(s, "%H:%M").is_ok()
}

fn parse_date_time_combo(date_str: &str, time_str: &str) -> Result<String, String> {
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| "Invalid date")?;
    let time = NaiveTime::parse_from_str(time_str, "%H:%M").map_err(|_| "Invalid time")?;
    Ok(NaiveDateTime::new(date, time).format("%Y-%m-%d %H:%M").to_string())
}

fn try_parse_date_or_time(s: &str, today: NaiveDate) -> Result<String, String> {
    if looks_like_date(s) {
        return Ok(s.to_string());
    }
    if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M") {
        return Ok(NaiveDateTime::new(today, time).format("%Y-%m-%d %H:%M").to_string());
    }
    Err("Unrecognized due date format".to_string())
}

fn validate_not_past(date: &str) -> Result<String, String> {
    if is_overdue(date) {
        return Err("Due date is in the past".to_string());
    }
    Ok(date.to_string())
}

// ---------------------------------------------------------------------------
// System helpers
// ---------------------------------------------------------------------------

#[cfg(target_os = "macos")]
fn open_in_browser(url: &str) -> Result<(), String> {
    Command::new("open")
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|e| format!("Failed to start open: {}", e))
}

#[cfg(target_os = "linux")]
fn open_in_browser(url: &str) -> Result<(), String> {
    Command::new("xdg-open")
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|e| format!("Failed to start xdg-open: {}", e))
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn open_in_browser(_url: &str) -> Result<(), String> {
    Err("Opening a browser is not supported on this OS".into())
}

#[cfg(target_os = "macos")]
fn copy_to_clipboard(text: &str) -> Result<(), String> {
    let mut child = Command::new("pbcopy")
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to start pbcopy: {}", e))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .map_err(|e| format!("Failed to write to pbcopy: {}", e))?;
    }
    let status = child.wait().map_err(|e| format!("pbcopy wait failed: {}", e))?;
    if status.success() { Ok(()) } else { Err("pbcopy failed".into()) }
}

#[cfg(target_os = "linux")]
fn copy_to_clipboard(text: &str) -> Result<(), String> {
    let mut child = Command::new("wl-copy")
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to start wl-copy: {}", e))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .map_err(|e| format!("Failed to write to wl-copy: {}", e))?;
    }
    let status = child.wait().map_err(|e| format!("wl-copy wait failed: {}", e))?;
    if status.success() { Ok(()) } else { Err("wl-copy failed".into()) }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn copy_to_clipboard(_text: &str) -> Result<(), String> {
    Err("Clipboard copy not supported on this OS".into())
}

#[cfg(target_os = "macos")]
fn paste_from_clipboard() -> Result<String, String> {
    let out = Command::new("pbpaste")
        .output()
        .map_err(|e| format!("Failed to start pbpaste: {}", e))?;
    if out.status.success() {
        Ok(String::from_utf8_lossy(&out.stdout).to_string())
    } else {
        Err("pbpaste failed".into())
    }
}

#[cfg(target_os = "linux")]
fn paste_from_clipboard() -> Result<String, String> {
    let out = Command::new("wl-paste")
        .output()
        .map_err(|e| format!("Failed to start wl-paste: {}", e))?;
    if out.status.success() {
        Ok(String::from_utf8_lossy(&out.stdout).to_string())
    } else {
        Err("wl-paste failed".into())
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn paste_from_clipboard() -> Result<String, String> {
    Err("Clipboard paste not supported on this OS".into())
}
