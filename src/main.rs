// main.rs

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;
use tasktrack::api::ApiClient;
use tasktrack::app::App;
use tasktrack::config::ClientConfig;
use tasktrack::task_store::TaskStore;
use tasktrack::ui::run_app;
use tracing_subscriber::EnvFilter;

// The terminal owns stdout, so logs go to a file.
fn init_logging(config: &ClientConfig) -> io::Result<()> {
    if let Some(parent) = config.log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tasktrack=info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = ClientConfig::load()?;
    init_logging(&config)?;
    tracing::info!(api_url = %config.api_url, "starting terminal client");

    let store = TaskStore::new(ApiClient::new(&config.api_url));
    let mut app = App::new(store);

    // A failed first load is shown in the status line; the user can retry with `r`.
    if let Err(err) = app.refresh_tasks().await {
        tracing::warn!(error = %err, "initial task load failed");
    }

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let res = run_app(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "terminal client exited with an error");
        eprintln!("Error: {:?}", err);
        std::process::exit(1);
    }

    Ok(())
}
