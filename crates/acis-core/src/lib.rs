pub mod config;
pub mod error;
pub mod event;
pub mod onboarding;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{AcisError, Result};
pub use event::EventBus;
pub use onboarding::{OnboardingState, OnboardingStep, StoreId};
pub use types::*;
