// daemon.rs
use crate::api::TaskApi;
use crate::task::Status;
use chrono::Local;
use std::{thread, time::Duration};

#[cfg(target_os = "linux")]
use notify_rust::Notification;

#[cfg(target_os = "windows")]
use notifica::notify;

#[cfg(target_os = "macos")]
use mac_notification_sys::*;

/// Reminder loop: lists the user's tasks and raises a desktop notification
/// for every open task due today. Runs quietly while logged out or offline
/// and tries again on the next cycle.
pub fn start_daemon(api: TaskApi) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let today = Local::now().format("%Y-%m-%d").to_string();
        if let Ok(tasks) = api.list() {
            for task in &tasks {
                if matches!(task.status, Status::Done | Status::Archived) {
                    continue;
                }
                let due_today = task
                    .due_date
                    .as_deref()
                    .map(|due| due.starts_with(&today))
                    .unwrap_or(false);
                if due_today {
                    #[cfg(target_os = "linux")]
                    Notification::new()
                        .summary("Task due today!")
                        .body(&format!("\"{}\" is due today! Don't forget!", task.title))
                        .show()?;
                    #[cfg(target_os = "windows")]
                    {
                        notify(
                            "Listo",
                            &format!("\"{}\" is due today! Don't forget!", task.title),
                        );
                    }
                    #[cfg(target_os = "macos")]
                    {
                        send_notification(
                            "Listo",
                            &None,
                            &format!("\"{}\" is due today! Don't forget!", task.title),
                            None,
                        )?;
                    }
                }
            }
        }
        thread::sleep(Duration::from_secs(900));
    }
}
