// task.rs

use crate::error::ApiError;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task. The server owns the transitions; the client
/// only displays them and asks for the ones the UI exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    New,
    InProgress,
    Done,
    Archived,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::New => "New",
            Status::InProgress => "In progress",
            Status::Done => "Completed",
            Status::Archived => "Completed",
        }
    }
}

/// Priority travels over the wire as an integer 1-4.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        match p {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Priority::Low),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::High),
            4 => Ok(Priority::Urgent),
            other => Err(format!("priority out of range: {}", other)),
        }
    }
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }

    /// Accepts "1".."4" or the spelled-out name, case-insensitive.
    pub fn parse(input: &str) -> Option<Priority> {
        match input.trim().to_lowercase().as_str() {
            "1" | "low" => Some(Priority::Low),
            "2" | "medium" => Some(Priority::Medium),
            "3" | "high" => Some(Priority::High),
            "4" | "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }

    pub fn next(&self) -> Priority {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Urgent,
            Priority::Urgent => Priority::Low,
        }
    }

    pub fn prev(&self) -> Priority {
        match self {
            Priority::Low => Priority::Urgent,
            Priority::Medium => Priority::Low,
            Priority::High => Priority::Medium,
            Priority::Urgent => Priority::High,
        }
    }
}

/// A task as the server returns it. `id` and `user_id` are server-assigned
/// and never written by the client; the timestamp fields are kept as the
/// server's strings and only parsed for display.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub archived_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub user_id: String,
}

/// Body for create and update. Same shape for both per the API.
#[derive(Clone, Debug, Serialize)]
pub struct TaskPayload {
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl TaskPayload {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            title: title.trim().to_string(),
            description: description.trim().to_string(),
            status: Status::New,
            priority: Priority::Medium,
            due_date: None,
            source_url: None,
        }
    }

    /// Client-side checks, rejected before anything is sent.
    pub fn validate(&self) -> Result<(), ApiError> {
        let title_len = self.title.chars().count();
        if title_len < 3 {
            return Err(ApiError::Validation(
                "Title must have at least 3 characters".to_string(),
            ));
        }
        if title_len > 100 {
            return Err(ApiError::Validation(
                "Title must have at most 100 characters".to_string(),
            ));
        }
        let desc_len = self.description.chars().count();
        if !self.description.is_empty() && desc_len < 10 {
            return Err(ApiError::Validation(
                "Description must have at least 10 characters".to_string(),
            ));
        }
        if desc_len > 500 {
            return Err(ApiError::Validation(
                "Description must have at most 500 characters".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_decodes_from_server_shape() {
        let body = r#"{
            "id": "9",
            "title": "Buy milk",
            "description": "whole, 2 liters",
            "status": "in_progress",
            "priority": 2,
            "created_at": "2025-05-01T10:00:00Z",
            "updated_at": "2025-05-02T10:00:00Z",
            "due_date": null,
            "archived_at": null,
            "completed_at": null,
            "deleted_at": null,
            "source_url": null,
            "user_id": "u-1"
        }"#;
        let task: Task = serde_json::from_str(body).unwrap();
        assert_eq!(task.id, "9");
        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.due_date.is_none());
    }

    #[test]
    fn priority_round_trips_as_integer() {
        let json = serde_json::to_string(&Priority::Urgent).unwrap();
        assert_eq!(json, "4");
        let back: Priority = serde_json::from_str("4").unwrap();
        assert_eq!(back, Priority::Urgent);
        assert!(serde_json::from_str::<Priority>("5").is_err());
    }

    #[test]
    fn priority_parse_accepts_names_and_digits() {
        assert_eq!(Priority::parse("3"), Some(Priority::High));
        assert_eq!(Priority::parse("Urgent"), Some(Priority::Urgent));
        assert_eq!(Priority::parse("  low "), Some(Priority::Low));
        assert_eq!(Priority::parse("asap"), None);
    }

    #[test]
    fn payload_omits_empty_optionals() {
        let payload = TaskPayload::new("Write report", "quarterly numbers");
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("due_date"));
        assert!(!json.contains("source_url"));
        assert!(json.contains("\"priority\":2"));
        assert!(json.contains("\"status\":\"new\""));
    }

    #[test]
    fn validation_bounds() {
        let mut p = TaskPayload::new("ab", "");
        assert!(matches!(p.validate(), Err(ApiError::Validation(_))));

        p.title = "abc".to_string();
        assert!(p.validate().is_ok());

        p.description = "too short".chars().take(5).collect();
        assert!(matches!(p.validate(), Err(ApiError::Validation(_))));

        p.description = "long enough description".to_string();
        assert!(p.validate().is_ok());

        p.title = "x".repeat(101);
        assert!(matches!(p.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn status_labels_merge_done_and_archived() {
        assert_eq!(Status::Done.label(), Status::Archived.label());
        let archived: Status = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(archived, Status::Archived);
    }
}
