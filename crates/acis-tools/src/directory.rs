//! Deterministic stand-in for the store and B2B back ends.
//!
//! Every answer is a pure function of the store ID, so the same store
//! always gets the same team, profile and B2B options across processes.

use std::sync::Mutex;

use futures::future::BoxFuture;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tracing::info;

use acis_core::error::Result;
use acis_core::onboarding::{B2BData, OnboardingReceipt, OnboardingRequest, StoreId, StoreInfo};
use acis_core::traits::StoreDirectory;

const TEAM_NAMES: [&str; 8] = [
    "Alpha Team",
    "Beta Squad",
    "Gamma Force",
    "Delta Unit",
    "Echo Group",
    "Foxtrot Division",
    "Golf Section",
    "Hotel Brigade",
];

const PROFILE_NAMES: [&str; 8] = [
    "Enterprise Profile",
    "Business Profile",
    "Premium Profile",
    "Standard Profile",
    "Advanced Profile",
    "Professional Profile",
    "Corporate Profile",
    "Executive Profile",
];

const B2B_PROFILES: [&str; 10] = [
    "Manufacturing Profile",
    "Retail Profile",
    "Healthcare Profile",
    "Technology Profile",
    "Finance Profile",
    "Education Profile",
    "Government Profile",
    "Non-Profit Profile",
    "Automotive Profile",
    "Real Estate Profile",
];

const B2B_IDENTITIES: [&str; 10] = [
    "Admin Identity",
    "Manager Identity",
    "Operator Identity",
    "Viewer Identity",
    "Editor Identity",
    "Analyst Identity",
    "Supervisor Identity",
    "Coordinator Identity",
    "Specialist Identity",
    "Executive Identity",
];

/// Stable 64-bit seed for a store: the first eight bytes of its SHA-256.
pub fn store_seed(store_id: &StoreId) -> u64 {
    let digest = Sha256::digest(store_id.as_str().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// In-memory directory with seeded mock data.
#[derive(Default)]
pub struct MockDirectory {
    onboarded: Mutex<Vec<OnboardingRequest>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests accepted so far, oldest first.
    pub fn onboarded(&self) -> Vec<OnboardingRequest> {
        self.onboarded
            .lock()
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    pub fn lookup(store_id: &StoreId) -> StoreInfo {
        let index = (store_seed(store_id) % TEAM_NAMES.len() as u64) as usize;
        StoreInfo {
            store_id: store_id.clone(),
            team_name: TEAM_NAMES[index].to_string(),
            profile_name: PROFILE_NAMES[index].to_string(),
        }
    }

    pub fn options(store_id: &StoreId) -> B2BData {
        let mut rng = StdRng::seed_from_u64(store_seed(store_id));
        let profile_count = rng.gen_range(2..=5);
        let identity_count = rng.gen_range(2..=5);
        let profiles = B2B_PROFILES
            .choose_multiple(&mut rng, profile_count)
            .map(|s| s.to_string())
            .collect();
        let identities = B2B_IDENTITIES
            .choose_multiple(&mut rng, identity_count)
            .map(|s| s.to_string())
            .collect();
        B2BData {
            profiles,
            identities,
        }
    }

    pub fn onboarding_id(store_id: &StoreId) -> String {
        format!("ONB-{:04}", store_seed(store_id) % 10_000)
    }
}

impl StoreDirectory for MockDirectory {
    fn store_info(&self, store_id: &StoreId) -> BoxFuture<'_, Result<StoreInfo>> {
        let info = Self::lookup(store_id);
        Box::pin(async move { Ok(info) })
    }

    fn b2b_data(&self, store_id: &StoreId) -> BoxFuture<'_, Result<B2BData>> {
        let data = Self::options(store_id);
        Box::pin(async move { Ok(data) })
    }

    fn onboard(&self, request: OnboardingRequest) -> BoxFuture<'_, Result<OnboardingReceipt>> {
        Box::pin(async move {
            info!("=== USER ONBOARDING INITIATED ===");
            info!(store_id = %request.store_id, "Store ID");
            info!(team_name = %request.team_name, "Team name");
            info!(profile_name = %request.profile_name, "Profile name");
            info!(selected_profiles = ?request.selected_profiles, "Selected B2B profiles");
            info!(selected_identities = ?request.selected_identities, "Selected B2B identities");
            info!("=== ONBOARDING LOGGED SUCCESSFULLY ===");

            let receipt = OnboardingReceipt {
                status: OnboardingReceipt::SUCCESS.to_string(),
                message: "User onboarding process initiated successfully".to_string(),
                onboarding_id: Self::onboarding_id(&request.store_id),
                user_details: request.clone(),
            };
            if let Ok(mut list) = self.onboarded.lock() {
                list.push(request);
            }
            Ok(receipt)
        })
    }
}
