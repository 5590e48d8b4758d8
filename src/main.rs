use anyhow::Result;
use tracing::info;

mod app;
mod client;
mod config;
mod handler;
mod tui;
mod ui;

use app::App;
use config::Config;
use tui::{EventHandler, Tui};

/// Initialize file logging. The TUI owns the terminal, so log output goes to
/// a rolling file under the local data dir. Returns a guard that must be
/// held for the app lifetime.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let logs_dir = dirs::data_local_dir()?.join("revenue-console").join("logs");
    std::fs::create_dir_all(&logs_dir).ok()?;

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "revcon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,revcon=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Guard must live for the entire app lifetime
    let _log_guard = init_logging();

    let config = Config::load().unwrap_or_else(|_| Config::new());
    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = %config.backend_url(),
        "revenue console starting"
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(&config);

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut Tui, events: &mut EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event)?;
        }

        // Ticks arrive every 250ms, so finished requests land promptly even
        // when the user is idle.
        app.poll_pending().await;
    }

    info!("revenue console shutting down");
    Ok(())
}
