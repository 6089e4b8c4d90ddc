//! In-process onboarding tools backed by a [`StoreDirectory`].
//!
//! These carry the same names and argument schemas as the MCP server's
//! tools, so the agent cannot tell which one it is talking to.

use std::sync::Arc;

use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use acis_core::error::{AcisError, Result};
use acis_core::onboarding::{tool_names, OnboardingRequest, StoreId};
use acis_core::traits::{StoreDirectory, Tool};
use acis_core::types::{ToolContext, ToolResult};

use crate::registry::ToolRegistry;

pub const STORE_INFO_DESCRIPTION: &str =
    "Get the team name and profile name assigned to a store. Call this first, once the user has given their store ID.";
pub const B2B_DATA_DESCRIPTION: &str =
    "Get the B2B profiles and B2B identities a store can choose from.";
pub const ONBOARD_USER_DESCRIPTION: &str =
    "Onboard the user with their selected B2B profiles and identities. Only call this after the user has confirmed their selections.";

/// Arguments for the store lookups.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreIdArgs {
    /// Store ID provided by the user, e.g. "ABC123"
    pub store_id: String,
}

impl StoreIdArgs {
    pub fn store_id(&self) -> Result<StoreId> {
        StoreId::parse(&self.store_id)
    }
}

/// Arguments for submitting an onboarding.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OnboardUserArgs {
    /// Store ID being onboarded
    pub store_id: String,
    /// Team name returned by the store lookup
    pub team_name: String,
    /// Profile name returned by the store lookup
    pub profile_name: String,
    /// B2B profiles the user selected
    pub selected_profiles: Vec<String>,
    /// B2B identities the user selected
    pub selected_identities: Vec<String>,
}

impl OnboardUserArgs {
    pub fn into_request(self) -> Result<OnboardingRequest> {
        Ok(OnboardingRequest {
            store_id: StoreId::parse(&self.store_id)?,
            team_name: self.team_name,
            profile_name: self.profile_name,
            selected_profiles: self.selected_profiles,
            selected_identities: self.selected_identities,
        })
    }
}

/// JSON schema for a tool's arguments.
pub fn schema_of<T: JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

fn parse_args<T: DeserializeOwned>(tool: &str, input: serde_json::Value) -> Result<T> {
    serde_json::from_value(input).map_err(|e| AcisError::ToolValidation(format!("{tool}: {e}")))
}

pub struct StoreInfoTool {
    directory: Arc<dyn StoreDirectory>,
}

impl Tool for StoreInfoTool {
    fn name(&self) -> &str {
        tool_names::STORE_INFO
    }

    fn description(&self) -> &str {
        STORE_INFO_DESCRIPTION
    }

    fn input_schema(&self) -> serde_json::Value {
        schema_of::<StoreIdArgs>()
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let args: StoreIdArgs = parse_args(self.name(), input)?;
            let info = self.directory.store_info(&args.store_id()?).await?;
            Ok(ToolResult::success(serde_json::to_string(&info)?))
        })
    }
}

pub struct B2BDataTool {
    directory: Arc<dyn StoreDirectory>,
}

impl Tool for B2BDataTool {
    fn name(&self) -> &str {
        tool_names::B2B_DATA
    }

    fn description(&self) -> &str {
        B2B_DATA_DESCRIPTION
    }

    fn input_schema(&self) -> serde_json::Value {
        schema_of::<StoreIdArgs>()
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let args: StoreIdArgs = parse_args(self.name(), input)?;
            let data = self.directory.b2b_data(&args.store_id()?).await?;
            Ok(ToolResult::success(serde_json::to_string(&data)?))
        })
    }
}

pub struct OnboardUserTool {
    directory: Arc<dyn StoreDirectory>,
}

impl Tool for OnboardUserTool {
    fn name(&self) -> &str {
        tool_names::ONBOARD_USER
    }

    fn description(&self) -> &str {
        ONBOARD_USER_DESCRIPTION
    }

    fn input_schema(&self) -> serde_json::Value {
        schema_of::<OnboardUserArgs>()
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let args: OnboardUserArgs = parse_args(self.name(), input)?;
            let receipt = self.directory.onboard(args.into_request()?).await?;
            Ok(ToolResult::success(serde_json::to_string(&receipt)?))
        })
    }
}

/// Register the three onboarding tools against a directory.
pub fn register_onboarding_tools(registry: &mut ToolRegistry, directory: Arc<dyn StoreDirectory>) {
    registry.register(StoreInfoTool {
        directory: directory.clone(),
    });
    registry.register(B2BDataTool {
        directory: directory.clone(),
    });
    registry.register(OnboardUserTool { directory });
}
