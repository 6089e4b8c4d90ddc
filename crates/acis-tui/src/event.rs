use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent};
use tokio::sync::mpsc;

use acis_core::onboarding::{ChatReply, OnboardingState};

/// Results of background requests to the server.
#[derive(Debug)]
pub enum ServerEvent {
    Chat(Result<ChatReply, String>),
    State(Result<OnboardingState, String>),
    Reset(Result<(), String>),
}

/// Events that drive the TUI loop.
pub enum TuiEvent {
    Key(crossterm::event::KeyEvent),
    Resize(u16, u16),
    Server(ServerEvent),
    /// Tick timer for the spinner.
    Tick,
}

/// Merged event loop: crossterm + server replies + tick timer.
pub struct EventLoop {
    server_rx: mpsc::Receiver<ServerEvent>,
    tick_interval: Duration,
}

impl EventLoop {
    pub fn new(server_rx: mpsc::Receiver<ServerEvent>) -> Self {
        Self {
            server_rx,
            tick_interval: Duration::from_millis(100),
        }
    }

    /// Wait for the next event from any source.
    pub async fn next(&mut self) -> Option<TuiEvent> {
        let tick_sleep = tokio::time::sleep(self.tick_interval);

        // Poll crossterm in a blocking thread
        let crossterm_poll = tokio::task::spawn_blocking(|| {
            if event::poll(Duration::from_millis(50)).unwrap_or(false) {
                event::read().ok()
            } else {
                None
            }
        });

        tokio::select! {
            result = self.server_rx.recv() => result.map(TuiEvent::Server),
            result = crossterm_poll => {
                match result {
                    Ok(Some(CrosstermEvent::Key(key))) => Some(TuiEvent::Key(key)),
                    Ok(Some(CrosstermEvent::Resize(w, h))) => Some(TuiEvent::Resize(w, h)),
                    _ => Some(TuiEvent::Tick),
                }
            }
            _ = tick_sleep => Some(TuiEvent::Tick),
        }
    }
}
