pub mod directory;
pub mod onboarding;
pub mod registry;

pub use directory::MockDirectory;
pub use onboarding::{register_onboarding_tools, OnboardUserArgs, StoreIdArgs};
pub use registry::ToolRegistry;
