//! Onboarding domain model: store identifiers, tool payloads, and the
//! per-session state the workflow advances one message at a time.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AcisError, Result};

/// Names of the onboarding tools. The MCP server, the bridge and the
/// in-process fallback all register under these.
pub mod tool_names {
    pub const STORE_INFO: &str = "get_profile_and_team_name_by_store_id";
    pub const B2B_DATA: &str = "get_b2b_profiles_and_identities_by_store_id";
    pub const ONBOARD_USER: &str = "onboard_user";
}

const MAX_STORE_ID_LEN: usize = 64;

/// Identifier of the store being onboarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreId(String);

impl StoreId {
    pub fn parse(raw: &str) -> Result<Self> {
        let id = raw.trim();
        if id.is_empty() {
            return Err(AcisError::InvalidStoreId("store ID is empty".into()));
        }
        if id.chars().count() > MAX_STORE_ID_LEN {
            return Err(AcisError::InvalidStoreId(format!(
                "store ID is longer than {MAX_STORE_ID_LEN} characters"
            )));
        }
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(AcisError::InvalidStoreId(format!(
                "unexpected character {bad:?} in {id:?}"
            )));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StoreId {
    type Err = AcisError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StoreId {
    type Error = AcisError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<StoreId> for String {
    fn from(id: StoreId) -> Self {
        id.0
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Team and profile assigned to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub store_id: StoreId,
    pub team_name: String,
    pub profile_name: String,
}

/// B2B options a store can choose from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct B2BData {
    pub profiles: Vec<String>,
    pub identities: Vec<String>,
}

/// Details submitted when the user confirms onboarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingRequest {
    pub store_id: StoreId,
    pub team_name: String,
    pub profile_name: String,
    pub selected_profiles: Vec<String>,
    pub selected_identities: Vec<String>,
}

/// Result of an onboarding submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingReceipt {
    pub status: String,
    pub message: String,
    pub onboarding_id: String,
    pub user_details: OnboardingRequest,
}

impl OnboardingReceipt {
    pub const SUCCESS: &'static str = "success";

    pub fn is_success(&self) -> bool {
        self.status == Self::SUCCESS
    }
}

/// Where a session is in the onboarding flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    #[default]
    CollectStoreId,
    FetchStoreInfo,
    FetchB2bData,
    CollectSelections,
    InProgress,
    Completed,
}

impl OnboardingStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollectStoreId => "collect_store_id",
            Self::FetchStoreInfo => "fetch_store_info",
            Self::FetchB2bData => "fetch_b2b_data",
            Self::CollectSelections => "collect_selections",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CollectStoreId => "Collect Store ID",
            Self::FetchStoreInfo => "Fetch Store Info",
            Self::FetchB2bData => "Fetch B2B Data",
            Self::CollectSelections => "Collect Selections",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phrases in an assistant reply that mark onboarding as done.
const COMPLETION_MARKERS: &[&str] = &["onboarding completed", "successfully"];

/// Per-session onboarding progress.
///
/// Once the step reaches `Completed` the state is frozen: every `apply_*`
/// and `set_*` call becomes a no-op until the session is reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingState {
    pub store_id: Option<StoreId>,
    pub team_name: Option<String>,
    pub profile_name: Option<String>,
    pub b2b_profiles: Option<Vec<String>>,
    pub b2b_identities: Option<Vec<String>>,
    pub selected_profiles: Option<Vec<String>>,
    pub selected_identities: Option<Vec<String>>,
    pub onboarding_id: Option<String>,
    pub step: OnboardingStep,
}

impl OnboardingState {
    pub fn is_completed(&self) -> bool {
        self.step == OnboardingStep::Completed
    }

    /// Set the store. A different store invalidates everything derived from
    /// the previous one. Returns whether the store changed.
    pub fn set_store_id(&mut self, id: StoreId) -> bool {
        if self.is_completed() || self.store_id.as_ref() == Some(&id) {
            return false;
        }
        *self = OnboardingState {
            store_id: Some(id),
            ..Default::default()
        };
        true
    }

    /// Whether a tool has filled in data for the current store.
    fn has_tool_data(&self) -> bool {
        self.team_name.is_some() || self.b2b_profiles.is_some() || self.b2b_identities.is_some()
    }

    pub fn apply_store_info(&mut self, info: StoreInfo) {
        if self.is_completed() {
            return;
        }
        self.set_store_id(info.store_id);
        self.team_name = Some(info.team_name);
        self.profile_name = Some(info.profile_name);
    }

    pub fn apply_b2b_data(&mut self, store_id: StoreId, data: B2BData) {
        if self.is_completed() {
            return;
        }
        self.set_store_id(store_id);
        self.b2b_profiles = Some(data.profiles);
        self.b2b_identities = Some(data.identities);
        // Re-check earlier picks against the now known options.
        if let Some(picks) = self.selected_profiles.take() {
            self.set_selected_profiles(picks);
        }
        if let Some(picks) = self.selected_identities.take() {
            self.set_selected_identities(picks);
        }
    }

    /// Record a successful submission. The receipt's user details are
    /// authoritative for the fields they carry.
    pub fn apply_receipt(&mut self, receipt: OnboardingReceipt) {
        if self.is_completed() || !receipt.is_success() {
            return;
        }
        let details = receipt.user_details;
        self.set_store_id(details.store_id);
        self.team_name = Some(details.team_name);
        self.profile_name = Some(details.profile_name);
        self.selected_profiles = non_empty(details.selected_profiles);
        self.selected_identities = non_empty(details.selected_identities);
        self.onboarding_id = Some(receipt.onboarding_id);
    }

    pub fn set_selected_profiles(&mut self, picks: Vec<String>) {
        if self.is_completed() {
            return;
        }
        self.selected_profiles = non_empty(normalize_selection(picks, self.b2b_profiles.as_deref()));
    }

    pub fn set_selected_identities(&mut self, picks: Vec<String>) {
        if self.is_completed() {
            return;
        }
        self.selected_identities =
            non_empty(normalize_selection(picks, self.b2b_identities.as_deref()));
    }

    /// Merge loosely typed updates, e.g. from an LLM extraction pass.
    ///
    /// Unknown keys, nulls and the literal `"None"` are skipped, as is
    /// `step`, which is always derived. Returns the names of applied fields.
    pub fn apply_updates(&mut self, updates: &Map<String, Value>) -> Vec<&'static str> {
        let mut applied = Vec::new();
        if self.is_completed() {
            return applied;
        }

        // Store first: switching stores clears the fields below. Once tool
        // data exists only a tool result may switch the store.
        if let Some(raw) = updates.get("store_id").and_then(value_as_text) {
            match StoreId::parse(&raw) {
                Ok(id) if self.has_tool_data() && self.store_id.as_ref() != Some(&id) => {
                    tracing::debug!(store_id = %id, "Ignoring extracted store ID over tool data");
                }
                Ok(id) => {
                    self.set_store_id(id);
                    applied.push("store_id");
                }
                Err(e) => tracing::debug!(error = %e, "Ignoring extracted store ID"),
            }
        }
        if let Some(team) = updates.get("team_name").and_then(value_as_text) {
            self.team_name = Some(team);
            applied.push("team_name");
        }
        if let Some(profile) = updates.get("profile_name").and_then(value_as_text) {
            self.profile_name = Some(profile);
            applied.push("profile_name");
        }
        if let Some(list) = updates.get("b2b_profiles").and_then(value_as_list) {
            self.b2b_profiles = Some(list);
            applied.push("b2b_profiles");
        }
        if let Some(list) = updates.get("b2b_identities").and_then(value_as_list) {
            self.b2b_identities = Some(list);
            applied.push("b2b_identities");
        }
        if let Some(list) = updates.get("selected_profiles").and_then(value_as_list) {
            self.set_selected_profiles(list);
            applied.push("selected_profiles");
        }
        if let Some(list) = updates.get("selected_identities").and_then(value_as_list) {
            self.set_selected_identities(list);
            applied.push("selected_identities");
        }
        applied
    }

    /// Recompute `step` from the collected fields and the latest reply.
    pub fn derive_step(&mut self, last_response: &str) -> OnboardingStep {
        if self.is_completed() {
            return self.step;
        }
        let reply = last_response.to_lowercase();
        self.step = if self.store_id.is_none() {
            OnboardingStep::CollectStoreId
        } else if self.team_name.is_none() || self.profile_name.is_none() {
            OnboardingStep::FetchStoreInfo
        } else if !has_items(&self.b2b_profiles) || !has_items(&self.b2b_identities) {
            OnboardingStep::FetchB2bData
        } else if !has_items(&self.selected_profiles) || !has_items(&self.selected_identities) {
            OnboardingStep::CollectSelections
        } else if self.onboarding_id.is_some()
            || COMPLETION_MARKERS.iter().any(|m| reply.contains(m))
        {
            OnboardingStep::Completed
        } else {
            OnboardingStep::InProgress
        };
        self.step
    }

    /// Plain-text rendering used in prompts.
    pub fn summary(&self) -> String {
        fn text(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or("Not provided")
        }
        fn list(v: &Option<Vec<String>>, missing: &'static str) -> String {
            match v {
                Some(items) if !items.is_empty() => items.join(", "),
                _ => missing.to_string(),
            }
        }

        let mut out = String::new();
        out.push_str(&format!(
            "- Store ID: {}\n",
            self.store_id.as_ref().map(StoreId::as_str).unwrap_or("Not provided")
        ));
        out.push_str(&format!("- Team Name: {}\n", text(&self.team_name)));
        out.push_str(&format!("- Profile Name: {}\n", text(&self.profile_name)));
        out.push_str(&format!(
            "- Available B2B Profiles: {}\n",
            list(&self.b2b_profiles, "Not fetched")
        ));
        out.push_str(&format!(
            "- Available B2B Identities: {}\n",
            list(&self.b2b_identities, "Not fetched")
        ));
        out.push_str(&format!(
            "- Selected Profiles: {}\n",
            list(&self.selected_profiles, "None")
        ));
        out.push_str(&format!(
            "- Selected Identities: {}\n",
            list(&self.selected_identities, "None")
        ));
        if let Some(id) = &self.onboarding_id {
            out.push_str(&format!("- Onboarding ID: {id}\n"));
        }
        out.push_str(&format!("- Current Step: {}", self.step));
        out
    }
}

/// Message posted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Reply to a posted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub state: OnboardingState,
    #[serde(default)]
    pub completed: bool,
}

fn has_items(list: &Option<Vec<String>>) -> bool {
    list.as_ref().is_some_and(|l| !l.is_empty())
}

fn non_empty(list: Vec<String>) -> Option<Vec<String>> {
    if list.is_empty() {
        None
    } else {
        Some(list)
    }
}

fn is_placeholder(s: &str) -> bool {
    s.is_empty() || s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("null")
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!is_placeholder(s)).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_list(value: &Value) -> Option<Vec<String>> {
    let items: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(value_as_text).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !is_placeholder(s))
            .map(str::to_string)
            .collect(),
        _ => return None,
    };
    non_empty(items)
}

/// Lower-cased name without the " profile" / " identity" suffix.
fn core_name(s: &str) -> String {
    let lower = s.trim().to_lowercase();
    for suffix in [" profile", " identity"] {
        if let Some(stripped) = lower.strip_suffix(suffix) {
            return stripped.trim_end().to_string();
        }
    }
    lower
}

/// Map picks onto the canonical option names, dropping unknown entries and
/// duplicates. Without known options the trimmed picks are kept as given.
fn normalize_selection(picks: Vec<String>, options: Option<&[String]>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for pick in picks {
        let pick = pick.trim();
        if is_placeholder(pick) {
            continue;
        }
        let canonical = match options {
            Some(options) => {
                let wanted = core_name(pick);
                match options.iter().find(|o| core_name(o) == wanted) {
                    Some(o) => o.clone(),
                    None => continue,
                }
            }
            None => pick.to_string(),
        };
        if !out.contains(&canonical) {
            out.push(canonical);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sid(s: &str) -> StoreId {
        StoreId::parse(s).unwrap()
    }

    fn info(store: &str) -> StoreInfo {
        StoreInfo {
            store_id: sid(store),
            team_name: "Alpha Team".into(),
            profile_name: "Enterprise Profile".into(),
        }
    }

    fn b2b() -> B2BData {
        B2BData {
            profiles: vec!["Retail Profile".into(), "Finance Profile".into()],
            identities: vec!["Admin Identity".into(), "Viewer Identity".into()],
        }
    }

    #[test]
    fn store_id_trims_and_validates() {
        assert_eq!(sid("  ABC123 ").as_str(), "ABC123");
        assert!(StoreId::parse("").is_err());
        assert!(StoreId::parse("   ").is_err());
        assert!(StoreId::parse("ABC 123").is_err());
        assert!(StoreId::parse(&"x".repeat(65)).is_err());
        assert!(StoreId::parse("store-01_a.b").is_ok());
    }

    #[test]
    fn store_id_serializes_as_plain_string() {
        let json = serde_json::to_value(sid("S-1")).unwrap();
        assert_eq!(json, json!("S-1"));
        let bad: std::result::Result<StoreId, _> = serde_json::from_value(json!("no spaces allowed"));
        assert!(bad.is_err());
    }

    #[test]
    fn steps_advance_with_collected_data() {
        let mut state = OnboardingState::default();
        assert_eq!(state.derive_step(""), OnboardingStep::CollectStoreId);

        state.set_store_id(sid("ABC123"));
        assert_eq!(state.derive_step(""), OnboardingStep::FetchStoreInfo);

        state.apply_store_info(info("ABC123"));
        assert_eq!(state.derive_step(""), OnboardingStep::FetchB2bData);

        state.apply_b2b_data(sid("ABC123"), b2b());
        assert_eq!(state.derive_step(""), OnboardingStep::CollectSelections);

        state.set_selected_profiles(vec!["Retail Profile".into()]);
        assert_eq!(state.derive_step(""), OnboardingStep::CollectSelections);

        state.set_selected_identities(vec!["Admin Identity".into()]);
        assert_eq!(
            state.derive_step("Shall I go ahead?"),
            OnboardingStep::InProgress
        );
        assert_eq!(
            state.derive_step("Your onboarding completed without issues."),
            OnboardingStep::Completed
        );
    }

    #[test]
    fn empty_lists_count_as_missing() {
        let mut state = OnboardingState::default();
        state.apply_store_info(info("S1"));
        state.b2b_profiles = Some(vec![]);
        state.b2b_identities = Some(vec!["Admin Identity".into()]);
        assert_eq!(state.derive_step(""), OnboardingStep::FetchB2bData);
    }

    #[test]
    fn completion_marker_is_case_insensitive() {
        let mut state = OnboardingState::default();
        state.apply_store_info(info("S1"));
        state.apply_b2b_data(sid("S1"), b2b());
        state.set_selected_profiles(vec!["retail".into()]);
        state.set_selected_identities(vec!["viewer".into()]);
        assert_eq!(
            state.derive_step("Onboarding submitted SUCCESSFULLY."),
            OnboardingStep::Completed
        );
    }

    #[test]
    fn changing_store_clears_dependent_fields() {
        let mut state = OnboardingState::default();
        state.apply_store_info(info("S1"));
        state.apply_b2b_data(sid("S1"), b2b());

        assert!(!state.set_store_id(sid("S1")));
        assert!(state.team_name.is_some());

        assert!(state.set_store_id(sid("S2")));
        assert_eq!(state.store_id, Some(sid("S2")));
        assert!(state.team_name.is_none());
        assert!(state.b2b_profiles.is_none());
    }

    #[test]
    fn selections_are_matched_to_known_options() {
        let mut state = OnboardingState::default();
        state.apply_b2b_data(sid("S1"), b2b());
        state.set_selected_profiles(vec![
            "retail".into(),
            "RETAIL PROFILE".into(),
            "Healthcare Profile".into(),
        ]);
        assert_eq!(state.selected_profiles, Some(vec!["Retail Profile".to_string()]));

        state.set_selected_identities(vec!["Nobody".into()]);
        assert_eq!(state.selected_identities, None);
    }

    #[test]
    fn selections_without_options_are_kept() {
        let mut state = OnboardingState::default();
        state.set_selected_profiles(vec![" Retail Profile ".into(), "".into()]);
        assert_eq!(state.selected_profiles, Some(vec!["Retail Profile".to_string()]));
    }

    #[test]
    fn late_options_filter_earlier_selections() {
        let mut state = OnboardingState::default();
        state.set_store_id(sid("S1"));
        state.set_selected_profiles(vec!["finance".into(), "Space Profile".into()]);
        state.apply_b2b_data(sid("S1"), b2b());
        assert_eq!(state.selected_profiles, Some(vec!["Finance Profile".to_string()]));
    }

    #[test]
    fn updates_skip_placeholders_and_step() {
        let mut state = OnboardingState::default();
        let updates = json!({
            "store_id": "ABC123",
            "team_name": "None",
            "profile_name": null,
            "b2b_profiles": ["Retail Profile", "None"],
            "selected_identities": "Admin Identity, Viewer Identity",
            "step": "completed",
            "favourite_colour": "blue"
        });
        let applied = state.apply_updates(updates.as_object().unwrap());

        assert_eq!(
            applied,
            vec!["store_id", "b2b_profiles", "selected_identities"]
        );
        assert_eq!(state.store_id, Some(sid("ABC123")));
        assert!(state.team_name.is_none());
        assert_eq!(state.b2b_profiles, Some(vec!["Retail Profile".to_string()]));
        assert_eq!(
            state.selected_identities,
            Some(vec!["Admin Identity".to_string(), "Viewer Identity".to_string()])
        );
        assert_eq!(state.step, OnboardingStep::CollectStoreId);
    }

    #[test]
    fn updates_ignore_invalid_store_ids() {
        let mut state = OnboardingState::default();
        let updates = json!({ "store_id": "my store please" });
        assert!(state.apply_updates(updates.as_object().unwrap()).is_empty());
        assert!(state.store_id.is_none());
    }

    #[test]
    fn extracted_store_id_does_not_override_tool_data() {
        let mut state = OnboardingState::default();
        state.apply_store_info(info("ABC123"));
        state.apply_b2b_data(sid("ABC123"), b2b());

        let updates = json!({ "store_id": "abc-123", "selected_profiles": ["finance"] });
        let applied = state.apply_updates(updates.as_object().unwrap());

        assert_eq!(applied, vec!["selected_profiles"]);
        assert_eq!(state.store_id, Some(sid("ABC123")));
        assert!(state.team_name.is_some());
        assert_eq!(state.selected_profiles, Some(vec!["Finance Profile".to_string()]));

        // A tool result for another store still switches
        state.apply_store_info(info("XYZ789"));
        assert_eq!(state.store_id, Some(sid("XYZ789")));
        assert!(state.b2b_profiles.is_none());
    }

    #[test]
    fn extracted_store_id_switches_before_tool_data() {
        let mut state = OnboardingState::default();
        state.apply_updates(json!({ "store_id": "S1" }).as_object().unwrap());
        state.apply_updates(json!({ "store_id": "S2" }).as_object().unwrap());
        assert_eq!(state.store_id, Some(sid("S2")));
    }

    #[test]
    fn numeric_store_id_is_accepted() {
        let mut state = OnboardingState::default();
        let updates = json!({ "store_id": 4021 });
        state.apply_updates(updates.as_object().unwrap());
        assert_eq!(state.store_id, Some(sid("4021")));
    }

    #[test]
    fn receipt_completes_and_freezes_state() {
        let mut state = OnboardingState::default();
        state.apply_store_info(info("S1"));
        state.apply_b2b_data(sid("S1"), b2b());
        state.apply_receipt(OnboardingReceipt {
            status: "success".into(),
            message: "User onboarding process initiated successfully".into(),
            onboarding_id: "ONB-0042".into(),
            user_details: OnboardingRequest {
                store_id: sid("S1"),
                team_name: "Alpha Team".into(),
                profile_name: "Enterprise Profile".into(),
                selected_profiles: vec!["Retail Profile".into()],
                selected_identities: vec!["Admin Identity".into()],
            },
        });
        assert_eq!(state.derive_step("Done."), OnboardingStep::Completed);
        assert_eq!(state.onboarding_id.as_deref(), Some("ONB-0042"));

        assert!(!state.set_store_id(sid("S9")));
        state.set_selected_profiles(vec!["Finance Profile".into()]);
        assert_eq!(state.selected_profiles, Some(vec!["Retail Profile".to_string()]));
        assert_eq!(state.derive_step(""), OnboardingStep::Completed);
    }

    #[test]
    fn failed_receipt_is_ignored() {
        let mut state = OnboardingState::default();
        state.apply_receipt(OnboardingReceipt {
            status: "error".into(),
            message: "nope".into(),
            onboarding_id: "ONB-0001".into(),
            user_details: OnboardingRequest {
                store_id: sid("S1"),
                team_name: "t".into(),
                profile_name: "p".into(),
                selected_profiles: vec![],
                selected_identities: vec![],
            },
        });
        assert_eq!(state, OnboardingState::default());
    }

    #[test]
    fn state_json_exposes_every_field() {
        let json = serde_json::to_value(OnboardingState::default()).unwrap();
        for key in [
            "store_id",
            "team_name",
            "profile_name",
            "b2b_profiles",
            "b2b_identities",
            "selected_profiles",
            "selected_identities",
        ] {
            assert!(json[key].is_null(), "{key} should be null");
        }
        assert_eq!(json["step"], "collect_store_id");

        let partial: OnboardingState = serde_json::from_value(json!({"store_id": "S1"})).unwrap();
        assert_eq!(partial.step, OnboardingStep::CollectStoreId);
    }

    #[test]
    fn summary_lists_placeholders() {
        let summary = OnboardingState::default().summary();
        assert!(summary.contains("- Store ID: Not provided"));
        assert!(summary.contains("- Available B2B Profiles: Not fetched"));
        assert!(summary.contains("- Current Step: collect_store_id"));
    }
}
