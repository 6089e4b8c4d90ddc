use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;

use acis_core::onboarding::OnboardingState;
use acis_core::types::SessionId;

use crate::api::ApiClient;
use crate::event::{EventLoop, ServerEvent, TuiEvent};
use crate::input::{InputAction, InputHandler};
use crate::ui;

pub const WELCOME: &str =
    "Welcome to the ACIS onboarding assistant! Please share your Store ID to get started.";
pub const COMPLETED_NOTICE: &str =
    "Onboarding is complete. Use /reset to start a new onboarding or /quit to exit.";

/// Role for display messages.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageRole {
    User,
    Assistant,
    Error,
    System,
}

/// A message displayed in the TUI.
#[derive(Debug, Clone)]
pub struct DisplayMessage {
    pub role: MessageRole,
    pub text: String,
}

impl DisplayMessage {
    fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// A request the app wants sent to the server.
#[derive(Debug, PartialEq)]
pub enum Request {
    Chat(String),
    State,
    Reset,
}

/// Application state.
pub struct App {
    pub messages: Vec<DisplayMessage>,
    pub input: InputHandler,
    pub session_id: SessionId,
    pub state: OnboardingState,
    pub pending: bool,
    pub should_quit: bool,
    pub scroll_offset: usize,
    pub tick_count: usize,
}

impl App {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            messages: vec![DisplayMessage::new(MessageRole::Assistant, WELCOME)],
            input: InputHandler::new(),
            session_id,
            state: OnboardingState::default(),
            pending: false,
            should_quit: false,
            scroll_offset: 0,
            tick_count: 0,
        }
    }

    fn system(&mut self, text: impl Into<String>) {
        self.messages.push(DisplayMessage::new(MessageRole::System, text));
    }

    fn error(&mut self, text: impl Into<String>) {
        self.messages.push(DisplayMessage::new(MessageRole::Error, text));
    }

    /// Apply an input action. Returns the request to send, if any.
    pub fn on_action(&mut self, action: InputAction) -> Option<Request> {
        match action {
            InputAction::Quit => {
                self.should_quit = true;
                None
            }
            InputAction::Clear => {
                self.messages.clear();
                self.system("Cleared.");
                None
            }
            InputAction::ScrollUp => {
                self.scroll_offset = self.scroll_offset.saturating_add(3);
                None
            }
            InputAction::ScrollDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(3);
                None
            }
            InputAction::Unknown(cmd) => {
                self.system(format!(
                    "Unknown command {}. Try /reset, /state, /clear or /quit.",
                    cmd
                ));
                None
            }
            InputAction::None => None,
            _ if self.pending => {
                self.system("Still waiting for the server...");
                None
            }
            InputAction::Reset => {
                self.pending = true;
                Some(Request::Reset)
            }
            InputAction::RefreshState => {
                self.pending = true;
                Some(Request::State)
            }
            InputAction::Submit(_) if self.state.is_completed() => {
                self.system(COMPLETED_NOTICE);
                None
            }
            InputAction::Submit(text) => {
                self.messages
                    .push(DisplayMessage::new(MessageRole::User, text.clone()));
                self.scroll_offset = 0;
                self.pending = true;
                Some(Request::Chat(text))
            }
        }
    }

    /// Apply a server response.
    pub fn on_server_event(&mut self, event: ServerEvent) {
        self.pending = false;
        match event {
            ServerEvent::Chat(Ok(reply)) => {
                let newly_completed = reply.completed && !self.state.is_completed();
                self.messages
                    .push(DisplayMessage::new(MessageRole::Assistant, reply.response));
                self.state = reply.state;
                if newly_completed {
                    self.system("Onboarding completed successfully!");
                }
                self.scroll_offset = 0;
            }
            ServerEvent::Chat(Err(e)) => {
                self.error(format!("Error communicating with server: {}", e));
            }
            ServerEvent::State(Ok(state)) => {
                self.state = state;
            }
            ServerEvent::State(Err(e)) => {
                self.error(format!("Could not load session state: {}", e));
            }
            ServerEvent::Reset(Ok(())) => {
                self.messages = vec![DisplayMessage::new(MessageRole::Assistant, WELCOME)];
                self.state = OnboardingState::default();
                self.system("Session reset.");
                self.scroll_offset = 0;
            }
            ServerEvent::Reset(Err(e)) => {
                self.error(format!("Could not reset session: {}", e));
            }
        }
    }
}

/// Run a request in the background and post its result back.
fn dispatch(api: &ApiClient, session_id: &SessionId, request: Request, tx: mpsc::Sender<ServerEvent>) {
    let api = api.clone();
    let sid = session_id.clone();
    tokio::spawn(async move {
        let event = match request {
            Request::Chat(text) => {
                ServerEvent::Chat(api.chat(&sid, &text).await.map_err(|e| e.to_string()))
            }
            Request::State => ServerEvent::State(api.state(&sid).await.map_err(|e| e.to_string())),
            Request::Reset => ServerEvent::Reset(api.reset(&sid).await.map_err(|e| e.to_string())),
        };
        if tx.send(event).await.is_err() {
            tracing::debug!("UI closed before the server replied");
        }
    });
}

/// Main app loop.
pub async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    api: ApiClient,
    session_id: SessionId,
) -> anyhow::Result<()> {
    let mut app = App::new(session_id.clone());
    let (tx, rx) = mpsc::channel(16);
    let mut events = EventLoop::new(rx);

    // Resumed sessions show their progress straight away
    app.pending = true;
    dispatch(&api, &session_id, Request::State, tx.clone());

    while !app.should_quit {
        terminal.draw(|f| ui::draw(f, &app))?;

        let Some(event) = events.next().await else {
            break;
        };
        match event {
            TuiEvent::Key(key) => {
                let action = app.input.handle_key(key);
                if let Some(request) = app.on_action(action) {
                    dispatch(&api, &session_id, request, tx.clone());
                }
            }
            TuiEvent::Server(event) => app.on_server_event(event),
            TuiEvent::Tick => {
                app.tick_count += 1;
            }
            TuiEvent::Resize(_, _) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use acis_core::onboarding::{ChatReply, OnboardingStep};

    fn reply(text: &str, step: OnboardingStep) -> ChatReply {
        let state = OnboardingState {
            step,
            ..Default::default()
        };
        ChatReply {
            response: text.into(),
            completed: step == OnboardingStep::Completed,
            state,
        }
    }

    #[test]
    fn starts_with_welcome() {
        let app = App::new(SessionId::default());
        assert_eq!(app.messages[0].text, WELCOME);
    }

    #[test]
    fn submit_sends_once_until_reply() {
        let mut app = App::new(SessionId::default());
        assert_eq!(
            app.on_action(InputAction::Submit("ABC123".into())),
            Some(Request::Chat("ABC123".into()))
        );
        assert!(app.pending);
        assert_eq!(app.on_action(InputAction::Submit("again".into())), None);

        app.on_server_event(ServerEvent::Chat(Ok(reply(
            "Thanks!",
            OnboardingStep::FetchStoreInfo,
        ))));
        assert!(!app.pending);
        assert_eq!(app.state.step, OnboardingStep::FetchStoreInfo);
        assert_eq!(app.messages.last().unwrap().text, "Thanks!");
    }

    #[test]
    fn completion_blocks_further_chat() {
        let mut app = App::new(SessionId::default());
        app.on_action(InputAction::Submit("yes".into()));
        app.on_server_event(ServerEvent::Chat(Ok(reply(
            "Onboarding completed successfully!",
            OnboardingStep::Completed,
        ))));
        assert_eq!(app.messages.last().unwrap().role, MessageRole::System);

        assert_eq!(app.on_action(InputAction::Submit("more".into())), None);
        assert_eq!(app.messages.last().unwrap().text, COMPLETED_NOTICE);
        assert_eq!(app.on_action(InputAction::Reset), Some(Request::Reset));
    }

    #[test]
    fn reset_restores_welcome() {
        let mut app = App::new(SessionId::default());
        app.state.step = OnboardingStep::Completed;
        app.on_action(InputAction::Reset);
        app.on_server_event(ServerEvent::Reset(Ok(())));
        assert_eq!(app.state, OnboardingState::default());
        assert_eq!(app.messages[0].text, WELCOME);
    }

    #[test]
    fn errors_are_shown() {
        let mut app = App::new(SessionId::default());
        app.on_action(InputAction::Submit("hi".into()));
        app.on_server_event(ServerEvent::Chat(Err("HTTP 500: boom".into())));
        let last = app.messages.last().unwrap();
        assert_eq!(last.role, MessageRole::Error);
        assert!(last.text.contains("HTTP 500: boom"));
    }

    #[test]
    fn quit_and_unknown_commands() {
        let mut app = App::new(SessionId::default());
        app.on_action(InputAction::Unknown("/foo".into()));
        assert!(app.messages.last().unwrap().text.contains("/foo"));
        app.on_action(InputAction::Quit);
        assert!(app.should_quit);
    }
}
