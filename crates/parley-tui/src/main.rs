use anyhow::Result;
use parley_core::{build_model, Config};
use tracing::{info, warn};

mod app;
mod handler;
mod input;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = logging::init() {
        eprintln!("Warning: logging disabled: {err:#}");
    }

    let config = Config::load().unwrap_or_else(|err| {
        let cause = format!("{err:#}");
        warn!(error = %cause, "could not load config, using defaults");
        Config::new()
    });
    let settings = config.resolve();
    info!(
        provider = settings.provider.as_str(),
        model = %settings.model,
        "starting parley"
    );

    let model = build_model(&settings);
    let mut app = App::new(settings, model);
    app.config_path = Config::get_config_path().ok();

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}
