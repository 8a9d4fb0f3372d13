use crate::api::TaskGateway;
use crate::app::{App, View};
use crate::form::{FormField, TaskForm};
use crate::models::{Priority, StatusFilter, Task};
use crate::task_store::TaskState;
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn key_hint(key: &'static str, action: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(key, Style::default().fg(Color::Red)),
        Span::raw(action),
    ]
}

fn get_legend(view: View, confirming: bool) -> Text<'static> {
    let hints: Vec<[Span<'static>; 2]> = match (view, confirming) {
        (View::List, true) => vec![key_hint(" y ", ": Delete "), key_hint(" any ", ": Cancel ")],
        (View::List, false) => vec![
            key_hint(" q ", ": Quit "),
            key_hint(" j/k ", ": Move "),
            key_hint(" f ", ": Filter "),
            key_hint(" 1/2/3 ", ": All/Pending/Completed "),
            key_hint(" Space ", ": Toggle Done "),
            key_hint(" a ", ": Add "),
            key_hint(" e ", ": Edit "),
            key_hint(" d ", ": Delete "),
            key_hint(" r ", ": Reload "),
            key_hint(" Esc ", ": Dismiss "),
        ],
        (View::Form, _) => vec![
            key_hint(" Tab ", ": Next Field "),
            key_hint(" Space/←/→ ", ": Change Choice "),
            key_hint(" Enter ", ": Save "),
            key_hint(" Esc ", ": Cancel "),
        ],
    };
    Text::from(Line::from(hints.into_iter().flatten().collect::<Vec<_>>()))
}

fn filter_label(filter: StatusFilter) -> &'static str {
    match filter {
        StatusFilter::All => "All",
        StatusFilter::Pending => "Pending",
        StatusFilter::Completed => "Completed",
    }
}

fn priority_style(priority: Priority) -> Style {
    match priority {
        Priority::High => Style::default().fg(Color::Red),
        Priority::Medium => Style::default().fg(Color::Yellow),
        Priority::Low => Style::default().fg(Color::DarkGray),
    }
}

fn task_item(task: &Task) -> ListItem<'static> {
    let marker = if task.completed {
        Span::styled("[x] ", Style::default().fg(Color::Green))
    } else {
        Span::raw("[ ] ")
    };
    let title = if task.completed {
        Span::styled(
            task.title.clone(),
            Style::default().add_modifier(Modifier::CROSSED_OUT),
        )
    } else {
        Span::raw(task.title.clone())
    };
    ListItem::new(Line::from(vec![
        marker,
        title,
        Span::raw("  "),
        Span::styled(format!("{:<6}", task.priority), priority_style(task.priority)),
        Span::raw(format!(" due {}", task.due_date.format("%Y-%m-%d"))),
    ]))
}

fn detail_lines(task: &Task) -> Vec<Line<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let field = |label: &'static str, value: String| {
        Line::from(vec![Span::styled(label, bold), Span::raw(value)])
    };

    let mut lines = vec![
        field("Title: ", task.title.clone()),
        field(
            "Status: ",
            if task.completed { "Completed" } else { "Pending" }.to_string(),
        ),
        field("Due Date: ", task.due_date.format("%Y-%m-%d").to_string()),
        field("Priority: ", task.priority.to_string()),
        field(
            "Created: ",
            task.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ),
        field(
            "Updated: ",
            task.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        ),
        Line::from(Span::styled("Description: ", bold)),
    ];

    match task.description.as_deref().map(str::trim) {
        Some(desc) if !desc.is_empty() => {
            lines.extend(desc.lines().map(|line| Line::from(line.to_string())));
        }
        _ => lines.push(Line::from(Span::raw("No description".to_string()))),
    }
    lines
}

fn draw_list<G: TaskGateway>(f: &mut Frame, app: &mut App<G>, state: &TaskState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)].as_ref())
        .split(area);

    let task_title = format!(
        "Tasks ({}) - {} total, {} pending, {} done",
        filter_label(state.filter),
        state.total(),
        state.pending_count(),
        state.completed_count()
    );

    // Left panel: Task list
    let visible = state.filtered();
    let tasks_widget = if !visible.is_empty() {
        let tasks: Vec<ListItem> = visible.iter().map(|task| task_item(task)).collect();

        List::new(tasks)
            .block(Block::default().borders(Borders::ALL).title(task_title))
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ")
    } else {
        List::new(vec![ListItem::new("No tasks available")])
            .block(Block::default().borders(Borders::ALL).title(task_title))
    };

    f.render_stateful_widget(tasks_widget, chunks[0], &mut app.state);

    // Right panel: Task details
    let detail_block = Block::default().borders(Borders::ALL).title("Task Details");
    let selected = app.state.selected().and_then(|i| visible.get(i).copied());
    let paragraph = match selected {
        Some(task) => Paragraph::new(detail_lines(task)),
        None => Paragraph::new("Select a task to see its details"),
    };
    f.render_widget(paragraph.block(detail_block).wrap(Wrap { trim: true }), chunks[1]);

    if let Some(task) = &app.confirm_delete {
        let prompt = format!("Delete \"{}\"? (y/n)", task.title);
        let width = (prompt.chars().count() as u16 + 4).min(area.width);
        let popup_area = centered_rect_absolute(width, 3, area);
        let popup = Paragraph::new(prompt).block(
            Block::default()
                .title("Confirm")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Red)),
        );
        f.render_widget(Clear, popup_area);
        f.render_widget(popup, popup_area);
    }
}

fn form_field_lines(form: &TaskForm, field: FormField) -> Vec<Line<'static>> {
    let focused = form.focus == field;
    let label_style = if focused {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let value = match field {
        FormField::Title => form.title.clone(),
        FormField::Description => form.description.clone(),
        FormField::DueDate => form.due_date.clone(),
        FormField::Priority => Priority::ALL
            .iter()
            .map(|priority| {
                if *priority == form.priority {
                    format!("[{}]", priority)
                } else {
                    format!(" {} ", priority)
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
        FormField::Completed => if form.completed { "[x]" } else { "[ ]" }.to_string(),
    };
    let cursor = if focused && field.is_text() { "_" } else { "" };

    let mut lines = vec![Line::from(vec![
        Span::styled(if focused { "> " } else { "  " }, label_style),
        Span::styled(format!("{}: ", field.label()), label_style),
        Span::raw(value),
        Span::styled(cursor, Style::default().fg(Color::Green)),
    ])];
    if let Some(error) = form.error_for(field) {
        lines.push(Line::from(Span::styled(
            format!("    {}", error),
            Style::default().fg(Color::Red),
        )));
    }
    lines
}

fn draw_form(f: &mut Frame, form: &TaskForm, area: Rect) {
    let fields = [
        FormField::Title,
        FormField::Description,
        FormField::DueDate,
        FormField::Priority,
        FormField::Completed,
    ];
    let lines: Vec<Line<'static>> = fields
        .iter()
        .flat_map(|field| form_field_lines(form, *field))
        .collect();

    let title = if form.is_edit() {
        "Edit Task (Press Enter to Save)"
    } else {
        "New Task (Press Enter to Save)"
    };
    let popup_width = ((u32::from(area.width) * 70 / 100) as u16)
        .max(40)
        .min(area.width);
    let popup_height = (lines.len() as u16 + 2).min(area.height);
    let popup_area = centered_rect_absolute(popup_width, popup_height, area);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::White));

    f.render_widget(Clear, popup_area);
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        popup_area,
    );
}

fn status_line(state: &TaskState, notice: Option<&str>) -> Line<'static> {
    if state.loading {
        return Line::from(Span::styled("Loading...", Style::default().fg(Color::Yellow)));
    }
    if let Some(error) = &state.error {
        return Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    match notice {
        Some(notice) => Line::from(Span::styled(
            notice.to_string(),
            Style::default().fg(Color::Cyan),
        )),
        None => Line::from(""),
    }
}

pub fn draw<G: TaskGateway>(f: &mut Frame, app: &mut App<G>) {
    let size = f.area();
    let state = app.store.snapshot();

    // Split the main layout into body, status and footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints(
            [
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(size);

    let body_chunk = chunks[0];
    let status_chunk = chunks[1];
    let footer_chunk = chunks[2];

    draw_list(f, app, &state, body_chunk);
    if app.view == View::Form {
        draw_form(f, &app.form, body_chunk);
    }

    f.render_widget(
        Paragraph::new(status_line(&state, app.notice.as_deref())),
        status_chunk,
    );

    // Render the legend in the footer
    let legend = Paragraph::new(get_legend(app.view, app.confirm_delete.is_some()))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(legend, footer_chunk);
}

/// Draws, then handles one key at a time. While a key's server call is in
/// flight, each change the store publishes redraws the screen as it was
/// before the key, so the loading state shows.
pub async fn run_app<B: Backend, G: TaskGateway + Clone>(
    terminal: &mut Terminal<B>,
    mut app: App<G>,
) -> io::Result<()> {
    let mut updates = app.store.subscribe();

    loop {
        terminal.draw(|f| draw(f, &mut app))?;

        // Handle input
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let CEvent::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let mut pending = app.clone();
        updates.borrow_and_update();
        let input = app.handle_input(key);
        tokio::pin!(input);

        let should_quit = loop {
            tokio::select! {
                should_quit = &mut input => break should_quit,
                Ok(()) = updates.changed() => {
                    updates.borrow_and_update();
                    terminal.draw(|f| draw(f, &mut pending))?;
                }
            }
        };
        if should_quit {
            return Ok(());
        }
    }
}
