//! Conversion between [`Task`] and its JSON wire form
//!
//! Timestamps travel as RFC 3339 strings in UTC. Sub-second precision is kept
//! so that a round trip reproduces the same instant.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::model::{describe_field_errors, Category, FieldErrors, Priority, Task, TaskStatus};

/// Wire form of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedTask {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub category: Category,
    pub priority: Priority,
    pub estimated_duration: f64,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// Serialization failures
#[derive(Debug, Error)]
pub enum SerializationError {
    /// A task could not be encoded
    #[error("Failed to serialize task: {message}")]
    Serialize {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The input is not valid JSON
    #[error("Failed to parse task JSON: {message}")]
    MalformedJson {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Valid JSON that does not describe a valid task
    #[error("Invalid task data: {message}")]
    InvalidShape { message: String, errors: FieldErrors },
}

impl SerializationError {
    /// `"serialization"` or `"deserialization"`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Serialize { .. } => "serialization",
            Self::MalformedJson { .. } | Self::InvalidShape { .. } => "deserialization",
        }
    }

    pub fn is_deserialization(&self) -> bool {
        self.kind() == "deserialization"
    }

    fn invalid_shape(message: impl Into<String>, field: &str, detail: impl Into<String>) -> Self {
        Self::InvalidShape {
            message: message.into(),
            errors: FieldErrors::from([(field.to_string(), vec![detail.into()])]),
        }
    }

    fn at_index(self, index: usize) -> Self {
        match self {
            Self::InvalidShape { message, errors } => Self::InvalidShape {
                message: format!("task at index {}: {}", index, message),
                errors,
            },
            Self::Serialize { message, source } => Self::Serialize {
                message: format!("task at index {}: {}", index, message),
                source,
            },
            other => other,
        }
    }
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, SerializationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| {
            SerializationError::invalid_shape(
                format!("{} is not an ISO-8601 timestamp: {}", field, value),
                field,
                e.to_string(),
            )
        })
}

/// Convert a task to its wire form
pub fn to_serialized(task: &Task) -> SerializedTask {
    SerializedTask {
        id: task.id.clone(),
        name: task.name.clone(),
        description: task.description.clone(),
        status: task.status,
        category: task.category,
        priority: task.priority,
        estimated_duration: task.estimated_duration,
        tags: task.tags.clone(),
        created_at: format_timestamp(&task.created_at),
        updated_at: format_timestamp(&task.updated_at),
        completed_at: task.completed_at.as_ref().map(format_timestamp),
    }
}

/// Convert a wire-form task back, parsing timestamps and validating fields
pub fn from_serialized(serialized: SerializedTask) -> Result<Task, SerializationError> {
    let task = Task {
        created_at: parse_timestamp("createdAt", &serialized.created_at)?,
        updated_at: parse_timestamp("updatedAt", &serialized.updated_at)?,
        completed_at: serialized
            .completed_at
            .as_deref()
            .map(|value| parse_timestamp("completedAt", value))
            .transpose()?,
        id: serialized.id,
        name: serialized.name,
        description: serialized.description,
        status: serialized.status,
        category: serialized.category,
        priority: serialized.priority,
        estimated_duration: serialized.estimated_duration,
        tags: serialized.tags,
    };

    task.validate()
        .map_err(|errors| SerializationError::InvalidShape {
            message: describe_field_errors(&errors),
            errors,
        })?;
    Ok(task)
}

fn check_encodable(task: &Task) -> Result<(), SerializationError> {
    if let Some(field) = task.out_of_range_timestamp() {
        return Err(SerializationError::Serialize {
            message: format!("{} of task {} is outside years 0000 to 9999", field, task.id),
            source: None,
        });
    }
    if !task.estimated_duration.is_finite() {
        return Err(SerializationError::Serialize {
            message: format!(
                "estimatedDuration of task {} is not a finite number",
                task.id
            ),
            source: None,
        });
    }
    Ok(())
}

fn encode<T: Serialize>(value: &T) -> Result<String, SerializationError> {
    serde_json::to_string(value).map_err(|e| SerializationError::Serialize {
        message: e.to_string(),
        source: Some(e),
    })
}

fn parse_json(json: &str) -> Result<Value, SerializationError> {
    serde_json::from_str(json).map_err(|e| SerializationError::MalformedJson {
        message: e.to_string(),
        source: e,
    })
}

fn task_from_value(value: Value) -> Result<Task, SerializationError> {
    if !value.is_object() {
        return Err(SerializationError::invalid_shape(
            "expected a JSON object",
            "task",
            "not an object",
        ));
    }

    let serialized: SerializedTask = serde_json::from_value(value).map_err(|e| {
        SerializationError::invalid_shape(e.to_string(), "task", e.to_string())
    })?;
    from_serialized(serialized)
}

/// Encode one task as a JSON object
pub fn serialize_task(task: &Task) -> Result<String, SerializationError> {
    check_encodable(task)?;
    encode(&to_serialized(task))
}

/// Decode one task from a JSON object
pub fn deserialize_task(json: &str) -> Result<Task, SerializationError> {
    task_from_value(parse_json(json)?)
}

/// Encode tasks as a JSON array, failing on the first task that cannot be encoded
pub fn serialize_tasks(tasks: &[Task]) -> Result<String, SerializationError> {
    let serialized = tasks
        .iter()
        .enumerate()
        .map(|(index, task)| {
            check_encodable(task)
                .map(|()| to_serialized(task))
                .map_err(|e| e.at_index(index))
        })
        .collect::<Result<Vec<_>, _>>()?;
    encode(&serialized)
}

/// Decode a JSON array of tasks, failing on the first invalid element
pub fn deserialize_tasks(json: &str) -> Result<Vec<Task>, SerializationError> {
    let Value::Array(items) = parse_json(json)? else {
        return Err(SerializationError::invalid_shape(
            "expected a JSON array",
            "tasks",
            "not an array",
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| task_from_value(item).map_err(|e| e.at_index(index)))
        .collect()
}
