//! Line-oriented client for terminals without a TUI.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use acis_core::onboarding::OnboardingState;
use acis_core::types::SessionId;

use crate::api::ApiClient;
use crate::app::{COMPLETED_NOTICE, WELCOME};
use crate::input::{parse_command, InputAction};

/// Chat over any line reader and writer until EOF or `/quit`.
pub async fn run_plain_io<R, W>(
    api: &ApiClient,
    session_id: &SessionId,
    reader: R,
    out: &mut W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "{}", WELCOME)?;

    let mut state = match api.state(session_id).await {
        Ok(state) => state,
        Err(e) => {
            writeln!(out, "[error] Could not load session state: {}", e)?;
            OnboardingState::default()
        }
    };
    if state.store_id.is_some() {
        writeln!(out, "Resuming session {}:\n{}", session_id, state.summary())?;
    }

    let mut lines = reader.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_command(&line) {
            InputAction::Quit => break,
            InputAction::None | InputAction::ScrollUp | InputAction::ScrollDown => {}
            InputAction::Clear => writeln!(out)?,
            InputAction::Unknown(cmd) => writeln!(
                out,
                "Unknown command {}. Try /reset, /state, /clear or /quit.",
                cmd
            )?,
            InputAction::RefreshState => match api.state(session_id).await {
                Ok(fresh) => {
                    state = fresh;
                    writeln!(out, "{}", state.summary())?;
                }
                Err(e) => writeln!(out, "[error] {}", e)?,
            },
            InputAction::Reset => match api.reset(session_id).await {
                Ok(()) => {
                    state = OnboardingState::default();
                    writeln!(out, "Session reset.\n{}", WELCOME)?;
                }
                Err(e) => writeln!(out, "[error] {}", e)?,
            },
            InputAction::Submit(_) if state.is_completed() => writeln!(out, "{}", COMPLETED_NOTICE)?,
            InputAction::Submit(text) => match api.chat(session_id, &text).await {
                Ok(reply) => {
                    writeln!(out, "{}", reply.response)?;
                    let newly_completed = reply.completed && !state.is_completed();
                    state = reply.state;
                    if newly_completed {
                        writeln!(
                            out,
                            "Onboarding completed successfully! Onboarding ID: {}",
                            state.onboarding_id.as_deref().unwrap_or("n/a")
                        )?;
                    }
                }
                Err(e) => writeln!(out, "[error] Error communicating with server: {}", e)?,
            },
        }
    }
    Ok(())
}

/// Chat over stdin and stdout.
pub async fn run_plain(api: ApiClient, session_id: SessionId) -> anyhow::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_plain_io(&api, &session_id, stdin, &mut stdout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use serde_json::json;

    async fn fake_server() -> String {
        let router = Router::new()
            .route(
                "/chat",
                post(|| async {
                    Json(json!({
                        "response": "Onboarding completed successfully!",
                        "state": {"store_id": "S1", "onboarding_id": "ONB-0001", "step": "completed"},
                        "completed": true
                    }))
                }),
            )
            .route(
                "/session/{id}/state",
                get(|| async { Json(json!({"step": "collect_store_id"})) }),
            )
            .route(
                "/session/{id}",
                delete(|| async { Json(json!({"message": "Session reset successfully"})) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn plain_session_flow() {
        let api = ApiClient::new(fake_server().await);
        let input = "yes\nanother\n/bogus\n/reset\n/quit\nignored\n";
        let mut out = Vec::new();
        run_plain_io(&api, &SessionId::default(), input.as_bytes(), &mut out)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with(WELCOME));
        assert!(out.contains("Onboarding ID: ONB-0001"));
        assert!(out.contains(COMPLETED_NOTICE));
        assert!(out.contains("Unknown command /bogus"));
        assert!(out.contains("Session reset."));
        assert!(!out.contains("ignored"));
    }
}
