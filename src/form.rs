//! Create/edit form state with the client-side checks.

use chrono::NaiveDate;

use crate::models::{NewTask, Priority, Task, TaskPatch};
use crate::validation::{parse_due_date, FieldError};

pub const TITLE_MIN_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    DueDate,
    Priority,
    Completed,
}

impl FormField {
    const ORDER: [FormField; 5] = [
        FormField::Title,
        FormField::Description,
        FormField::DueDate,
        FormField::Priority,
        FormField::Completed,
    ];

    fn position(self) -> usize {
        Self::ORDER
            .iter()
            .position(|field| *field == self)
            .unwrap_or(0)
    }

    pub fn next(self) -> FormField {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    pub fn previous(self) -> FormField {
        Self::ORDER[(self.position() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            FormField::Title | FormField::Description | FormField::DueDate
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            FormField::Title => "Title",
            FormField::Description => "Description",
            FormField::DueDate => "Due date (YYYY-MM-DD)",
            FormField::Priority => "Priority",
            FormField::Completed => "Completed",
        }
    }

    /// Name of the matching API field.
    pub fn key(self) -> &'static str {
        match self {
            FormField::Title => "title",
            FormField::Description => "description",
            FormField::DueDate => "dueDate",
            FormField::Priority => "priority",
            FormField::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskForm {
    pub mode: FormMode,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub priority: Priority,
    pub completed: bool,
    pub focus: FormField,
    /// Set once a submit has been attempted; errors are shown from then on.
    pub touched: bool,
}

impl Default for TaskForm {
    fn default() -> Self {
        TaskForm::new()
    }
}

impl TaskForm {
    pub fn new() -> Self {
        TaskForm {
            mode: FormMode::Create,
            title: String::new(),
            description: String::new(),
            due_date: String::new(),
            priority: Priority::Medium,
            completed: false,
            focus: FormField::Title,
            touched: false,
        }
    }

    pub fn edit(task: &Task) -> Self {
        TaskForm {
            mode: FormMode::Edit(task.id),
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            due_date: task.due_date.format("%Y-%m-%d").to_string(),
            priority: task.priority,
            completed: task.completed,
            focus: FormField::Title,
            touched: false,
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(self.mode, FormMode::Edit(_))
    }

    fn text_mut(&mut self, field: FormField) -> Option<&mut String> {
        match field {
            FormField::Title => Some(&mut self.title),
            FormField::Description => Some(&mut self.description),
            FormField::DueDate => Some(&mut self.due_date),
            FormField::Priority | FormField::Completed => None,
        }
    }

    pub fn push_char(&mut self, c: char) {
        let focus = self.focus;
        match self.text_mut(focus) {
            Some(text) => text.push(c),
            None if c == ' ' => self.toggle(),
            None => {}
        }
    }

    pub fn pop_char(&mut self) {
        let focus = self.focus;
        if let Some(text) = self.text_mut(focus) {
            text.pop();
        }
    }

    /// Cycles priority forward or flips `completed`, depending on focus.
    pub fn toggle(&mut self) {
        match self.focus {
            FormField::Priority => self.priority = self.priority.next(),
            FormField::Completed => self.completed = !self.completed,
            _ => {}
        }
    }

    pub fn cycle_back(&mut self) {
        match self.focus {
            FormField::Priority => self.priority = self.priority.previous(),
            FormField::Completed => self.completed = !self.completed,
            _ => {}
        }
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_previous(&mut self) {
        self.focus = self.focus.previous();
    }

    fn parsed_due_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.due_date.trim(), "%Y-%m-%d")
            .ok()
            .or_else(|| parse_due_date(&self.due_date))
    }

    /// Client-side checks mirroring the server's rules.
    pub fn errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let title = self.title.trim();
        if title.is_empty() {
            errors.push(FieldError::new("title", "Title is required"));
        } else if title.chars().count() < TITLE_MIN_LEN {
            errors.push(FieldError::new(
                "title",
                format!("Title must be at least {TITLE_MIN_LEN} characters"),
            ));
        }
        if self.due_date.trim().is_empty() {
            errors.push(FieldError::new("dueDate", "Due date is required"));
        } else if self.parsed_due_date().is_none() {
            errors.push(FieldError::new("dueDate", "Due date must be YYYY-MM-DD"));
        }
        errors
    }

    /// Message for `field`, only once a submit has been attempted.
    pub fn error_for(&self, field: FormField) -> Option<String> {
        if !self.touched {
            return None;
        }
        self.errors()
            .into_iter()
            .find(|error| error.field == field.key())
            .map(|error| error.message)
    }

    fn description_value(&self) -> Option<String> {
        let description = self.description.trim();
        if description.is_empty() {
            None
        } else {
            Some(description.to_string())
        }
    }

    /// The create payload, or `None` while the form has errors.
    pub fn to_new_task(&self) -> Option<NewTask> {
        if !self.errors().is_empty() {
            return None;
        }
        Some(NewTask {
            title: self.title.trim().to_string(),
            description: self.description_value(),
            due_date: self.parsed_due_date()?,
            completed: Some(self.completed),
            priority: self.priority,
        })
    }

    /// The full update payload; an emptied description clears it.
    pub fn to_patch(&self) -> Option<TaskPatch> {
        if !self.errors().is_empty() {
            return None;
        }
        Some(TaskPatch {
            title: Some(self.title.trim().to_string()),
            description: Some(self.description_value()),
            due_date: Some(self.parsed_due_date()?),
            completed: Some(self.completed),
            priority: Some(self.priority),
        })
    }
}
