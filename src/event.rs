use std::time::Duration;

use crossterm::event::{
    Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind, MouseEvent, MouseEventKind,
};
use futures_util::StreamExt;
use log::warn;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Application events.
#[derive(Debug)]
pub enum AppEvent {
    /// A tick event, sent at a regular interval.
    Tick,
    /// A key press event.
    Key(KeyEvent),
    /// A mouse click or wheel event.
    Mouse(MouseEvent),
    /// The terminal was resized.
    Resize(u16, u16),
}

/// Merges terminal input and a tick timer into one channel.
pub struct EventHandler {
    rx: UnboundedReceiver<AppEvent>,
    _tx: UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let tx_input = tx.clone();
        tokio::spawn(async move {
            let mut reader = EventStream::new();
            while let Some(result) = reader.next().await {
                let event = match result {
                    Ok(event) => event,
                    Err(err) => {
                        warn!("Terminal event stream error: {err}");
                        break;
                    }
                };
                let Some(app_event) = translate(event) else {
                    continue;
                };
                if tx_input.send(app_event).is_err() {
                    break;
                }
            }
        });

        let tx_tick = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_rate);
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, _tx: tx }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

fn translate(event: CrosstermEvent) -> Option<AppEvent> {
    match event {
        // Windows terminals also report key releases.
        CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
        CrosstermEvent::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Down(_) | MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                Some(AppEvent::Mouse(mouse))
            }
            _ => None,
        },
        CrosstermEvent::Resize(width, height) => Some(AppEvent::Resize(width, height)),
        _ => None,
    }
}
