use crate::api::{ClientError, TaskGateway};
use crate::form::{FormMode, TaskForm};
use crate::models::{StatusFilter, Task, TaskPatch};
use crate::task_store::TaskStore;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::ListState;

#[derive(Clone)]
pub struct App<G> {
    pub store: TaskStore<G>,
    pub state: ListState,
    pub view: View,
    pub form: TaskForm,
    /// Task awaiting a y/n delete confirmation.
    pub confirm_delete: Option<Task>,
    /// One-line notice shown in the status bar.
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    List,
    Form,
}

impl<G: TaskGateway> App<G> {
    pub fn new(store: TaskStore<G>) -> App<G> {
        App {
            store,
            state: ListState::default(),
            view: View::List,
            form: TaskForm::new(),
            confirm_delete: None,
            notice: None,
        }
    }

    pub fn visible_tasks(&self) -> Vec<Task> {
        self.store.filtered_tasks()
    }

    pub fn selected_task(&self) -> Option<Task> {
        let selected = self.state.selected()?;
        self.visible_tasks().into_iter().nth(selected)
    }

    /// Keeps the selection inside the filtered list after it changes.
    pub fn clamp_selection(&mut self) {
        let len = self.visible_tasks().len();
        let selected = match (self.state.selected(), len) {
            (_, 0) => None,
            (Some(i), len) if i >= len => Some(len - 1),
            (Some(i), _) => Some(i),
            (None, _) => Some(0),
        };
        self.state.select(selected);
    }

    pub async fn refresh_tasks(&mut self) -> Result<(), ClientError> {
        let result = self.store.load().await;
        self.clamp_selection();
        result
    }

    pub fn next(&mut self) {
        let len = self.visible_tasks().len();
        if len == 0 {
            self.state.select(None);
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible_tasks().len();
        if len == 0 {
            self.state.select(None);
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.store.set_filter(filter);
        self.state.select(None);
        self.clamp_selection();
    }

    pub async fn toggle_selected(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let patch = TaskPatch::completed(!task.completed);
        if self.store.update(task.id, patch).await.is_ok() {
            self.clamp_selection();
        }
    }

    pub async fn confirm_delete(&mut self) {
        let Some(task) = self.confirm_delete.take() else {
            return;
        };
        if self.store.delete(task.id).await.is_ok() {
            self.notice = Some(format!("Deleted \"{}\"", task.title));
            self.clamp_selection();
        }
    }

    pub fn open_create(&mut self) {
        self.form = TaskForm::new();
        self.view = View::Form;
    }

    /// Opens the form pre-filled from the server; falls back to the list
    /// when the task cannot be fetched.
    pub async fn open_edit(&mut self, id: i64) {
        match self.store.get_task(id).await {
            Some(task) => {
                self.form = TaskForm::edit(&task);
                self.view = View::Form;
            }
            None => {
                self.notice = Some(format!("Task {} is no longer available", id));
                self.back_to_list();
            }
        }
    }

    pub fn back_to_list(&mut self) {
        self.form = TaskForm::new();
        self.view = View::List;
        self.clamp_selection();
    }

    /// Submits the form; stays on it when invalid or when the request fails.
    pub async fn submit_form(&mut self) {
        self.form.touched = true;
        let result = match self.form.mode {
            FormMode::Create => match self.form.to_new_task() {
                Some(new_task) => self.store.create(new_task).await.map(|_| "Task created"),
                None => return,
            },
            FormMode::Edit(id) => match self.form.to_patch() {
                Some(patch) => self.store.update(id, patch).await.map(|_| "Task updated"),
                None => return,
            },
        };

        match result {
            Ok(message) => {
                self.notice = Some(message.to_string());
                self.back_to_list();
            }
            Err(err) => {
                self.notice = Some(err.to_string());
            }
        }
    }

    pub async fn handle_input(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }
        match self.view {
            View::List => self.handle_list_key(key).await,
            View::Form => {
                self.handle_form_key(key).await;
                false
            }
        }
    }

    async fn handle_list_key(&mut self, key: KeyEvent) -> bool {
        if self.confirm_delete.is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => self.confirm_delete().await,
                _ => self.confirm_delete = None,
            }
            return false;
        }

        self.notice = None;
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') | KeyCode::Down => self.next(),
            KeyCode::Char('k') | KeyCode::Up => self.previous(),
            KeyCode::Char('f') => {
                let filter = self.store.filter().next();
                self.set_filter(filter);
            }
            KeyCode::Char('1') => self.set_filter(StatusFilter::All),
            KeyCode::Char('2') => self.set_filter(StatusFilter::Pending),
            KeyCode::Char('3') => self.set_filter(StatusFilter::Completed),
            KeyCode::Char(' ') | KeyCode::Char('x') => self.toggle_selected().await,
            KeyCode::Char('d') => self.confirm_delete = self.selected_task(),
            KeyCode::Char('a') => self.open_create(),
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(task) = self.selected_task() {
                    self.open_edit(task.id).await;
                }
            }
            KeyCode::Esc => self.store.clear_error(),
            KeyCode::Char('r') => {
                // failures already land in the store's error field
                let _ = self.refresh_tasks().await;
            }
            _ => {}
        }
        false
    }

    async fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.back_to_list(),
            KeyCode::Enter => self.submit_form().await,
            KeyCode::Tab | KeyCode::Down => self.form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => self.form.focus_previous(),
            KeyCode::Left => self.form.cycle_back(),
            KeyCode::Right => self.form.toggle(),
            KeyCode::Backspace => self.form.pop_char(),
            KeyCode::Char(c) => self.form.push_char(c),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormField;
    use crate::models::Priority;
    use crate::task_store::testing::{task, FakeGateway};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn type_text(app: &mut App<FakeGateway>, text: &str) {
        for c in text.chars() {
            app.handle_input(key(KeyCode::Char(c))).await;
        }
    }

    async fn app_with(tasks: Vec<Task>) -> App<FakeGateway> {
        let mut app = App::new(TaskStore::new(FakeGateway::with_tasks(tasks)));
        app.refresh_tasks().await.unwrap();
        app
    }

    #[tokio::test]
    async fn test_navigation_wraps() {
        let mut app = app_with(vec![task(1, "a", false), task(2, "b", false)]).await;
        assert_eq!(app.state.selected(), Some(0));
        app.handle_input(key(KeyCode::Char('j'))).await;
        assert_eq!(app.selected_task().unwrap().id, 2);
        app.handle_input(key(KeyCode::Char('j'))).await;
        assert_eq!(app.selected_task().unwrap().id, 1);
        app.handle_input(key(KeyCode::Char('k'))).await;
        assert_eq!(app.selected_task().unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_quit() {
        let mut app = app_with(vec![]).await;
        assert!(app.handle_input(key(KeyCode::Char('q'))).await);
    }

    #[tokio::test]
    async fn test_toggle_completed() {
        let mut app = app_with(vec![task(1, "a", false)]).await;
        app.handle_input(key(KeyCode::Char(' '))).await;
        assert!(app.store.snapshot().find(1).unwrap().completed);
        assert!(app.store.gateway().server_tasks()[0].completed);
    }

    #[tokio::test]
    async fn test_filter_keys_do_not_refetch() {
        let mut app = app_with(vec![task(1, "a", false), task(2, "b", true)]).await;
        app.handle_input(key(KeyCode::Char('3'))).await;
        assert_eq!(app.store.filter(), StatusFilter::Completed);
        assert_eq!(app.selected_task().unwrap().id, 2);
        app.handle_input(key(KeyCode::Char('f'))).await;
        assert_eq!(app.store.filter(), StatusFilter::All);
        assert_eq!(app.store.gateway().calls(), vec!["list all"]);
    }

    #[tokio::test]
    async fn test_delete_needs_confirmation() {
        let mut app = app_with(vec![task(1, "a", false), task(2, "b", false)]).await;

        app.handle_input(key(KeyCode::Char('d'))).await;
        assert_eq!(app.confirm_delete.as_ref().map(|t| t.id), Some(1));
        app.handle_input(key(KeyCode::Char('n'))).await;
        assert!(app.confirm_delete.is_none());
        assert_eq!(app.store.snapshot().tasks.len(), 2);

        app.handle_input(key(KeyCode::Char('d'))).await;
        app.handle_input(key(KeyCode::Char('y'))).await;
        let state = app.store.snapshot();
        assert_eq!(state.tasks.len(), 1);
        assert!(state.find(1).is_none());
        assert_eq!(app.selected_task().unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_create_through_form() {
        let mut app = app_with(vec![]).await;
        app.handle_input(key(KeyCode::Char('a'))).await;
        assert_eq!(app.view, View::Form);

        // invalid submit keeps the form open and shows errors
        app.handle_input(key(KeyCode::Enter)).await;
        assert_eq!(app.view, View::Form);
        assert!(app.form.error_for(FormField::Title).is_some());
        assert!(app.store.gateway().calls().iter().all(|c| c != "create"));

        type_text(&mut app, "Buy milk").await;
        app.handle_input(key(KeyCode::Tab)).await;
        app.handle_input(key(KeyCode::Tab)).await;
        type_text(&mut app, "2024-01-01").await;
        app.handle_input(key(KeyCode::Tab)).await;
        app.handle_input(key(KeyCode::Left)).await;
        app.handle_input(key(KeyCode::Enter)).await;

        assert_eq!(app.view, View::List);
        let state = app.store.snapshot();
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(state.tasks[0].title, "Buy milk");
        assert_eq!(state.tasks[0].priority, Priority::Low);
        assert!(!state.tasks[0].completed);
    }

    #[tokio::test]
    async fn test_edit_prefills_from_server() {
        let mut app = app_with(vec![task(1, "Write report", false)]).await;
        app.handle_input(key(KeyCode::Char('e'))).await;
        assert_eq!(app.view, View::Form);
        assert_eq!(app.form.mode, FormMode::Edit(1));
        assert_eq!(app.form.title, "Write report");

        type_text(&mut app, " v2").await;
        app.handle_input(key(KeyCode::Enter)).await;
        assert_eq!(app.view, View::List);
        assert_eq!(app.store.snapshot().tasks[0].title, "Write report v2");
    }

    #[tokio::test]
    async fn test_edit_of_unavailable_task_returns_to_list() {
        let mut app = app_with(vec![task(1, "a", false)]).await;
        app.store.gateway().set_offline(true);
        app.handle_input(key(KeyCode::Enter)).await;
        assert_eq!(app.view, View::List);
        assert!(app.notice.as_deref().unwrap().contains("no longer available"));
        assert_eq!(app.store.snapshot().error, None);
    }

    #[tokio::test]
    async fn test_failed_submit_stays_on_form() {
        let mut app = app_with(vec![]).await;
        app.open_create();
        app.form.title = "Buy milk".to_string();
        app.form.due_date = "2024-01-01".to_string();
        app.store.gateway().set_offline(true);

        app.submit_form().await;
        assert_eq!(app.view, View::Form);
        assert!(app.notice.is_some());
        assert_eq!(
            app.store.snapshot().error.as_deref(),
            Some("Failed to create task")
        );
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_from_form_without_typing() {
        let mut app = app_with(vec![]).await;
        app.handle_input(key(KeyCode::Char('a'))).await;
        type_text(&mut app, "Buy").await;

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(app.handle_input(ctrl_c).await);
        assert_eq!(app.form.title, "Buy");
    }

    #[tokio::test]
    async fn test_escape_dismisses_error_on_list() {
        let mut app = app_with(vec![task(1, "a", false)]).await;
        app.store.gateway().set_offline(true);
        app.handle_input(key(KeyCode::Char('r'))).await;
        assert!(app.store.snapshot().error.is_some());

        app.handle_input(key(KeyCode::Esc)).await;
        assert_eq!(app.store.snapshot().error, None);
        assert_eq!(app.view, View::List);
    }

    #[tokio::test]
    async fn test_escape_cancels_form() {
        let mut app = app_with(vec![]).await;
        app.handle_input(key(KeyCode::Char('a'))).await;
        type_text(&mut app, "draft").await;
        app.handle_input(key(KeyCode::Esc)).await;
        assert_eq!(app.view, View::List);
        assert_eq!(app.form.title, "");
    }
}
