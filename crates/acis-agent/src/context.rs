use std::path::Path;
use tracing::debug;

use acis_core::onboarding::OnboardingState;
use acis_core::types::{ChatMessage, ContentBlock, Role};

/// Assemble the system prompt from sections.
pub struct ContextBuilder {
    parts: Vec<String>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Add a base system prompt.
    pub fn with_base_prompt(mut self, prompt: &str) -> Self {
        self.parts.push(prompt.trim().to_string());
        self
    }

    /// Add a titled section.
    pub fn with_section(mut self, label: &str, content: &str) -> Self {
        self.parts.push(format!("# {}\n\n{}", label, content.trim()));
        self
    }

    /// Add operator instructions.
    pub fn with_instructions(mut self, instructions: &str) -> Self {
        if !instructions.trim().is_empty() {
            self.parts.push(instructions.trim().to_string());
        }
        self
    }

    /// Build the final system message.
    pub fn build(self) -> ChatMessage {
        ChatMessage::system(self.parts.join("\n\n---\n\n"))
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

const ONBOARDING_PROMPT: &str = r#"You are an intelligent onboarding assistant for ACIS. Your goal is to help users complete their onboarding by collecting the necessary information and using the available tools.

## Workflow
1. Ask the user for their Store ID.
2. Use the store lookup tool to fetch their team name and profile name.
3. Use the B2B lookup tool to fetch the available B2B profiles and identities.
4. Help the user choose their preferred B2B profiles and identities from those options.
5. Summarise the selections and, once the user explicitly confirms, call the onboard tool.

## Guidelines
- Be helpful and clear, and guide the user through one step at a time
- Never invent store data; always use the tools
- Only offer B2B options the lookup returned
- Ask when you need clarification instead of assuming
- After a successful onboarding, tell the user the onboarding completed successfully and give them the onboarding ID
"#;

/// Resolve a system prompt spec.
///
/// If `spec` starts with `file:`, reads the file (relative to `base_dir` or absolute).
/// Falls back to literal string if file is unreadable.
pub fn resolve_system_prompt(spec: &str, base_dir: &Path) -> String {
    if let Some(path_str) = spec.strip_prefix("file:") {
        let path = Path::new(path_str);
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        };
        match std::fs::read_to_string(&resolved) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %resolved.display(), error = %e, "Failed to read system prompt file, using spec as literal");
                spec.to_string()
            }
        }
    } else {
        spec.to_string()
    }
}

/// System message for one onboarding turn: base instructions, the
/// session's current state, then any operator instructions.
pub fn build_onboarding_context(state: &OnboardingState, operator: Option<&str>) -> ChatMessage {
    let mut builder = ContextBuilder::new()
        .with_base_prompt(ONBOARDING_PROMPT)
        .with_section("Current Onboarding State", &state.summary());

    if state.is_completed() {
        builder = builder.with_instructions(
            "Onboarding for this session is already complete. Answer follow-up questions, \
             and do not call the onboard tool again.",
        );
    }

    if let Some(instructions) = operator {
        builder = builder.with_instructions(instructions);
    }

    builder.build()
}

fn is_tool_result_only(msg: &ChatMessage) -> bool {
    msg.role != Role::Assistant
        && !msg.content.is_empty()
        && msg
            .content
            .iter()
            .all(|b| matches!(b, ContentBlock::ToolResult { .. }))
}

/// Drop leading tool results whose calls fell outside the history window.
/// Returns how many messages were removed.
pub fn trim_orphaned_tool_results(history: &mut Vec<ChatMessage>) -> usize {
    let orphans = history.iter().take_while(|m| is_tool_result_only(m)).count();
    history.drain(..orphans);
    orphans
}
