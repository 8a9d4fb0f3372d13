//! Input checks for task payloads.
//!
//! Payloads are inspected as raw JSON so a wrong type is reported against
//! its field instead of failing deserialization as a whole. Every failing
//! field is collected.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{NewTask, Priority, TaskPatch};

pub const TITLE_MAX_LEN: usize = 255;

/// Field-level failure reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed for {}", field_names(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

fn field_names(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| error.field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationError {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![FieldError::new(field, message)])
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }
}

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];
const LOCAL_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
const OFFSET_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"];

/// Parses an ISO 8601 due date. Calendar dates are taken as-is; for a
/// date-time the date part is kept, read in its own offset.
pub fn parse_due_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
    {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.date_naive());
    }

    let local = value.strip_suffix(['Z', 'z']).unwrap_or(value);
    LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(local, format).ok())
        .map(|timestamp| timestamp.date())
        .or_else(|| {
            OFFSET_DATETIME_FORMATS.iter().find_map(|format| {
                DateTime::parse_from_str(value, format)
                    .ok()
                    .map(|timestamp| timestamp.date_naive())
            })
        })
}

/// Collects errors while pulling typed fields out of a JSON object.
struct Checker<'a> {
    body: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> Checker<'a> {
    fn new(body: &'a Map<String, Value>) -> Self {
        Self {
            body,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError::new(field, message));
    }

    /// `None` when absent (or `null`); records an error and returns `None` on bad input.
    fn title(&mut self, required: bool) -> Option<String> {
        match self.body.get("title") {
            None | Some(Value::Null) => {
                if required {
                    self.fail("title", "title is required");
                }
                None
            }
            Some(Value::String(title)) if title.trim().is_empty() => {
                self.fail("title", "title must not be empty");
                None
            }
            Some(Value::String(title)) if title.chars().count() > TITLE_MAX_LEN => {
                self.fail("title", "title must be at most 255 characters");
                None
            }
            Some(Value::String(title)) => Some(title.clone()),
            Some(_) => {
                self.fail("title", "title must be a string");
                None
            }
        }
    }

    /// Outer `None` when absent, `Some(None)` for an explicit `null`.
    fn description(&mut self) -> Option<Option<String>> {
        match self.body.get("description") {
            None => None,
            Some(Value::Null) => Some(None),
            Some(Value::String(description)) => Some(Some(description.clone())),
            Some(_) => {
                self.fail("description", "description must be a string");
                None
            }
        }
    }

    fn due_date(&mut self, required: bool) -> Option<NaiveDate> {
        match self.body.get("dueDate") {
            None | Some(Value::Null) => {
                if required {
                    self.fail("dueDate", "dueDate is required");
                }
                None
            }
            Some(Value::String(raw)) => {
                let parsed = parse_due_date(raw);
                if parsed.is_none() {
                    self.fail("dueDate", "dueDate must be a valid ISO 8601 date string");
                }
                parsed
            }
            Some(_) => {
                self.fail("dueDate", "dueDate must be a valid ISO 8601 date string");
                None
            }
        }
    }

    fn completed(&mut self) -> Option<bool> {
        match self.body.get("completed") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(completed)) => Some(*completed),
            Some(_) => {
                self.fail("completed", "completed must be a boolean value");
                None
            }
        }
    }

    fn priority(&mut self, required: bool) -> Option<Priority> {
        const MESSAGE: &str = "priority must be one of the following values: low, medium, high";
        match self.body.get("priority") {
            None | Some(Value::Null) => {
                if required {
                    self.fail("priority", "priority is required");
                }
                None
            }
            Some(Value::String(raw)) => match raw.parse() {
                Ok(priority) => Some(priority),
                Err(_) => {
                    self.fail("priority", MESSAGE);
                    None
                }
            },
            Some(_) => {
                self.fail("priority", MESSAGE);
                None
            }
        }
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.errors))
        }
    }
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, ValidationError> {
    body.as_object()
        .ok_or_else(|| ValidationError::single("body", "request body must be a JSON object"))
}

/// Validates a create payload.
pub fn validate_new_task(body: &Value) -> Result<NewTask, ValidationError> {
    let mut checker = Checker::new(as_object(body)?);

    let title = checker.title(true);
    let description = checker.description().flatten();
    let due_date = checker.due_date(true);
    let completed = checker.completed();
    let priority = checker.priority(true);
    checker.finish()?;

    match (title, due_date, priority) {
        (Some(title), Some(due_date), Some(priority)) => Ok(NewTask {
            title,
            description,
            due_date,
            completed,
            priority,
        }),
        // finish() has already reported every missing field
        _ => Err(ValidationError::single("body", "incomplete task payload")),
    }
}

/// Validates an update payload. Every field is optional.
pub fn validate_task_patch(body: &Value) -> Result<TaskPatch, ValidationError> {
    let mut checker = Checker::new(as_object(body)?);

    let patch = TaskPatch {
        title: checker.title(false),
        description: checker.description(),
        due_date: checker.due_date(false),
        completed: checker.completed(),
        priority: checker.priority(false),
    };
    checker.finish()?;

    Ok(patch)
}
