//! Second pass over a finished turn: ask the model which state fields the
//! conversation established, and fold in what the tools returned.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use acis_core::config::ModelConfig;
use acis_core::error::{AcisError, Result};
use acis_core::onboarding::{
    tool_names, B2BData, OnboardingReceipt, OnboardingState, StoreId, StoreInfo,
};
use acis_core::traits::LlmClient;
use acis_core::types::ChatMessage;
use acis_llm::complete_text;

use crate::agent_loop::ToolInvocation;

/// Asks the model for a JSON object of state fields the turn changed.
pub struct StateExtractor {
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
}

impl StateExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        Self { llm, model }
    }

    pub fn prompt(state: &OnboardingState, user_message: &str, ai_response: &str) -> String {
        format!(
            "Based on the conversation, extract and update the onboarding state information.\n\n\
             Current state:\n{}\n\n\
             Latest user message: {}\n\
             Latest AI response: {}\n\n\
             Extract any new information and return a JSON object with the updated state.\n\
             Only include fields that have been updated or newly discovered. Valid fields are \
             store_id, team_name, profile_name, b2b_profiles, b2b_identities, \
             selected_profiles and selected_identities; list fields are JSON arrays of strings.\n\n\
             Return only valid JSON.",
            state.summary(),
            user_message,
            ai_response
        )
    }

    /// Run the extraction and return the parsed updates.
    pub async fn extract(
        &self,
        state: &OnboardingState,
        user_message: &str,
        ai_response: &str,
    ) -> Result<Map<String, Value>> {
        let messages = vec![ChatMessage::user(Self::prompt(state, user_message, ai_response))];
        let raw = complete_text(&*self.llm, &self.model, messages).await?;
        parse_updates(&raw)
    }
}

/// Parse the model's reply into an object, tolerating code fences and
/// prose around the JSON.
pub fn parse_updates(raw: &str) -> Result<Map<String, Value>> {
    let trimmed = strip_code_fence(raw.trim());

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(map);
    }

    let object = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => {
            return Err(AcisError::StateExtraction(format!(
                "no JSON object in reply: {}",
                preview(trimmed)
            )))
        }
    };

    match serde_json::from_str::<Value>(object) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AcisError::StateExtraction("reply is not a JSON object".into())),
        Err(e) => Err(AcisError::StateExtraction(format!("{e}: {}", preview(object)))),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the language tag line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}

/// Apply successful tool results to the state. Returns how many were applied.
pub fn harvest_tool_results(state: &mut OnboardingState, invocations: &[ToolInvocation]) -> usize {
    let mut applied = 0;
    for call in invocations.iter().filter(|c| !c.result.is_error) {
        let content = call.result.content.as_str();
        let ok = match call.name.as_str() {
            tool_names::STORE_INFO => serde_json::from_str::<StoreInfo>(content)
                .map(|info| state.apply_store_info(info))
                .is_ok(),
            tool_names::B2B_DATA => {
                let store = call
                    .input
                    .get("store_id")
                    .and_then(Value::as_str)
                    .and_then(|s| StoreId::parse(s).ok());
                match (store, serde_json::from_str::<B2BData>(content)) {
                    (Some(store), Ok(data)) => {
                        state.apply_b2b_data(store, data);
                        true
                    }
                    _ => false,
                }
            }
            tool_names::ONBOARD_USER => serde_json::from_str::<OnboardingReceipt>(content)
                .map(|receipt| state.apply_receipt(receipt))
                .is_ok(),
            _ => false,
        };
        if ok {
            applied += 1;
        } else {
            debug!(tool = %call.name, "Tool result not applied to state");
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use acis_core::onboarding::OnboardingStep;
    use acis_core::types::ToolResult;
    use acis_test_utils::ScriptedLlm;
    use serde_json::json;

    #[test]
    fn parses_bare_and_fenced_json() {
        let plain = parse_updates(r#"{"store_id": "ABC123"}"#).unwrap();
        assert_eq!(plain["store_id"], "ABC123");

        let fenced = parse_updates("```json\n{\"team_name\": \"Alpha Team\"}\n```").unwrap();
        assert_eq!(fenced["team_name"], "Alpha Team");

        let chatty = parse_updates("Here you go: {\"store_id\": \"S1\"} Hope that helps").unwrap();
        assert_eq!(chatty["store_id"], "S1");
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            parse_updates("no updates"),
            Err(AcisError::StateExtraction(_))
        ));
        assert!(parse_updates("[1, 2]").is_err());
        assert!(parse_updates("{not json}").is_err());
    }

    #[test]
    fn prompt_lists_state_and_turn() {
        let prompt = StateExtractor::prompt(&OnboardingState::default(), "ABC123", "Thanks!");
        assert!(prompt.contains("- Store ID: Not provided"));
        assert!(prompt.contains("Latest user message: ABC123"));
        assert!(prompt.contains("Latest AI response: Thanks!"));
    }

    #[tokio::test]
    async fn extract_returns_model_updates() {
        let llm = ScriptedLlm::new().then_text("{\"store_id\": \"ABC123\"}");
        let extractor = StateExtractor::new(Arc::new(llm), ModelConfig::default());
        let updates = extractor
            .extract(&OnboardingState::default(), "ABC123", "Got it.")
            .await
            .unwrap();
        assert_eq!(updates["store_id"], "ABC123");
    }

    fn call(name: &str, input: Value, content: Value) -> ToolInvocation {
        ToolInvocation {
            name: name.into(),
            input,
            result: ToolResult::success(content.to_string()),
        }
    }

    #[test]
    fn harvests_each_tool() {
        let mut state = OnboardingState::default();
        let calls = vec![
            call(
                tool_names::STORE_INFO,
                json!({"store_id": "ABC123"}),
                json!({"store_id": "ABC123", "team_name": "Alpha Team", "profile_name": "Enterprise Profile"}),
            ),
            call(
                tool_names::B2B_DATA,
                json!({"store_id": "ABC123"}),
                json!({"profiles": ["Retail Profile", "Finance Profile"], "identities": ["Admin Identity", "Viewer Identity"]}),
            ),
        ];
        assert_eq!(harvest_tool_results(&mut state, &calls), 2);
        assert_eq!(state.team_name.as_deref(), Some("Alpha Team"));
        assert_eq!(state.b2b_profiles.as_ref().map(Vec::len), Some(2));

        let receipt = call(
            tool_names::ONBOARD_USER,
            json!({}),
            json!({
                "status": "success",
                "message": "User onboarding process initiated successfully",
                "onboarding_id": "ONB-0042",
                "user_details": {
                    "store_id": "ABC123",
                    "team_name": "Alpha Team",
                    "profile_name": "Enterprise Profile",
                    "selected_profiles": ["Retail Profile"],
                    "selected_identities": ["Admin Identity"]
                }
            }),
        );
        assert_eq!(harvest_tool_results(&mut state, &[receipt]), 1);
        assert_eq!(state.onboarding_id.as_deref(), Some("ONB-0042"));
        assert_eq!(state.derive_step(""), OnboardingStep::Completed);
    }

    #[test]
    fn errors_and_unknown_tools_are_skipped() {
        let mut state = OnboardingState::default();
        let failed = ToolInvocation {
            name: tool_names::STORE_INFO.into(),
            input: json!({"store_id": "ABC123"}),
            result: ToolResult::error("boom"),
        };
        let other = call("weather", json!({}), json!({"temp": 20}));
        assert_eq!(harvest_tool_results(&mut state, &[failed, other]), 0);
        assert_eq!(state, OnboardingState::default());
    }
}
