//! Task model definitions

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Per-field validation messages, keyed by wire field name
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Years whose timestamps have a four-digit RFC 3339 form
const TIMESTAMP_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Task classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Work,
    PersonalDev,
    Household,
    Learning,
    Other,
}

/// Task priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// A persisted task
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub category: Category,
    pub priority: Priority,
    /// Minutes
    pub estimated_duration: f64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new task with a generated id
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            status: TaskStatus::default(),
            category,
            priority: Priority::default(),
            estimated_duration: 0.0,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Set the id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the estimated duration in minutes
    pub fn with_estimated_duration(mut self, minutes: f64) -> Self {
        self.estimated_duration = minutes;
        self
    }

    /// Set the tags
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the initial status, keeping `completed_at` consistent with it
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self.completed_at = (status == TaskStatus::Completed).then_some(self.updated_at);
        self
    }

    /// Backdate creation, e.g. when importing
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        if self.completed_at.is_some() {
            self.completed_at = Some(created_at);
        }
        self
    }

    /// Wire name of the first timestamp outside years 0000 to 9999
    pub(crate) fn out_of_range_timestamp(&self) -> Option<&'static str> {
        [
            ("createdAt", Some(self.created_at)),
            ("updatedAt", Some(self.updated_at)),
            ("completedAt", self.completed_at),
        ]
        .into_iter()
        .find(|(_, value)| value.is_some_and(|v| !TIMESTAMP_YEARS.contains(&v.year())))
        .map(|(field, _)| field)
    }

    /// Check field-level rules
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut push = |field: &str, message: &str| {
            errors
                .entry(field.to_string())
                .or_default()
                .push(message.to_string());
        };

        if self.id.is_empty() {
            push("id", "must not be empty");
        }
        if self.name.is_empty() {
            push("name", "must not be empty");
        }
        if !self.estimated_duration.is_finite() {
            push("estimatedDuration", "must be a finite number");
        } else if self.estimated_duration < 0.0 {
            push("estimatedDuration", "must be zero or greater");
        }
        if let Some(field) = self.out_of_range_timestamp() {
            push(field, "must fall between years 0000 and 9999");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Produce the updated task described by `update`
    ///
    /// `id` and `created_at` cannot change, cancelled tasks cannot leave
    /// `Cancelled`, and `completed_at` follows transitions into and out of
    /// `Completed`. `updated_at` becomes `now`.
    pub fn apply(&self, update: TaskUpdate, now: DateTime<Utc>) -> Result<Task, UpdateError> {
        if update.id.is_some() {
            return Err(UpdateError::ImmutableField { field: "id" });
        }
        if update.created_at.is_some() {
            return Err(UpdateError::ImmutableField { field: "createdAt" });
        }

        let completed_at = match update.status {
            None => self.completed_at,
            Some(next) if next == self.status => self.completed_at,
            Some(next) if self.status == TaskStatus::Cancelled => {
                return Err(UpdateError::InvalidStatusTransition {
                    from: self.status,
                    to: next,
                });
            }
            Some(TaskStatus::Completed) => Some(now),
            Some(_) if self.status == TaskStatus::Completed => None,
            Some(_) => self.completed_at,
        };

        let task = Task {
            id: self.id.clone(),
            name: update.name.unwrap_or_else(|| self.name.clone()),
            description: update
                .description
                .unwrap_or_else(|| self.description.clone()),
            status: update.status.unwrap_or(self.status),
            category: update.category.unwrap_or(self.category),
            priority: update.priority.unwrap_or(self.priority),
            estimated_duration: update
                .estimated_duration
                .unwrap_or(self.estimated_duration),
            tags: update.tags.unwrap_or_else(|| self.tags.clone()),
            created_at: self.created_at,
            updated_at: now,
            completed_at,
        };

        task.validate().map_err(UpdateError::Validation)?;
        Ok(task)
    }
}

/// Partial change to a task
///
/// `id` and `created_at` exist only so that attempts to change them can be
/// rejected by [`Task::apply`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub estimated_duration: Option<f64>,
    pub tags: Option<Vec<String>>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_estimated_duration(mut self, minutes: f64) -> Self {
        self.estimated_duration = Some(minutes);
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }
}

/// Why an update was refused
#[derive(Debug, Error, PartialEq)]
pub enum UpdateError {
    #[error("Field '{field}' cannot be modified")]
    ImmutableField { field: &'static str },

    #[error("Cannot change status from {from} to {to}")]
    InvalidStatusTransition { from: TaskStatus, to: TaskStatus },

    #[error("Invalid task: {}", describe_field_errors(.0))]
    Validation(FieldErrors),
}

impl UpdateError {
    /// Field errors describing this failure
    pub fn field_errors(&self) -> FieldErrors {
        match self {
            Self::ImmutableField { field } => {
                FieldErrors::from([(field.to_string(), vec!["cannot be modified".to_string()])])
            }
            Self::InvalidStatusTransition { .. } => FieldErrors::from([(
                "status".to_string(),
                vec![self.to_string()],
            )]),
            Self::Validation(errors) => errors.clone(),
        }
    }
}

/// `field: message; field: message` rendering of field errors
pub fn describe_field_errors(errors: &FieldErrors) -> String {
    errors
        .iter()
        .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{}: {}", field, m)))
        .collect::<Vec<_>>()
        .join("; ")
}
