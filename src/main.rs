pub mod agent;
pub mod app;
pub mod config;
pub mod definitions;
pub mod event;
pub mod logging;
pub mod syntax;
pub mod tui;
pub mod ui;

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::sync::Notify;

use agent::CompletionClient;
use agent::providers::http::OpenAiClient;
use app::App;
use config::AppConfig;
use event::{AppEvent, EventHandler};
use tui::Tui;
use ui::render;

#[tokio::main]
async fn main() -> Result<()> {
    let workspace_root = env::current_dir().context("無法取得目前的工作目錄")?;
    let config = AppConfig::load(&workspace_root)?;
    logging::init(&workspace_root, &config.logging)?;
    info!(
        "Starting {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let registry = config.registry().context("人設清單設定錯誤")?;
    let client: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::new(
        &config.provider,
        config.provider.resolved_api_key(),
    ));
    if !client.has_credentials() {
        warn!(
            "{} is not set; chat submissions will be rejected",
            config.provider.api_key_env
        );
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut app = App::new(registry, client, &config);
    let mut events = EventHandler::new(app.tick_rate);
    let waker = app.waker();

    let result = run(&mut terminal, &mut app, &mut events, &waker).await;
    tui::restore()?;
    if let Err(err) = &result {
        error!("Application error: {err:?}");
    }
    info!("Shutting down");
    result
}

async fn run(
    terminal: &mut Tui,
    app: &mut App,
    events: &mut EventHandler,
    waker: &Notify,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| render(frame, app))?;

        let event = tokio::select! {
            event = events.next() => event,
            () = waker.notified() => {
                app.drain_responses();
                continue;
            }
        };
        let Some(event) = event else {
            break;
        };
        match event {
            AppEvent::Tick => app.on_tick(),
            AppEvent::Key(key) => app.handle_key(key),
            AppEvent::Mouse(mouse) => app.handle_mouse(mouse),
            AppEvent::Resize(_, _) => {}
        }
    }
    Ok(())
}
