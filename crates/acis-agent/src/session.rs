use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

use acis_core::types::SessionId;

/// Per-session lanes: requests for one session run one at a time, while
/// different sessions proceed in parallel.
#[derive(Default)]
pub struct SessionLanes {
    lanes: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLanes {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, session_id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut lanes = match self.lanes.lock() {
            Ok(lanes) => lanes,
            Err(poisoned) => poisoned.into_inner(),
        };
        lanes
            .entry(session_id.0.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Wait for the session's lane. Held until the guard drops.
    pub async fn acquire(&self, session_id: &SessionId) -> OwnedMutexGuard<()> {
        self.lane(session_id).lock_owned().await
    }

    /// Drop lanes nobody is holding or waiting on.
    pub fn prune_idle(&self) -> usize {
        let mut lanes = match self.lanes.lock() {
            Ok(lanes) => lanes,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = lanes.len();
        lanes.retain(|_, lane| Arc::strong_count(lane) > 1);
        before - lanes.len()
    }

    /// Number of sessions with a lane.
    pub fn len(&self) -> usize {
        self.lanes.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_session_is_serialised() {
        let lanes = SessionLanes::new();
        let sid = SessionId::from_string("a");
        let guard = lanes.acquire(&sid).await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), lanes.acquire(&sid)).await;
        assert!(blocked.is_err());

        drop(guard);
        let _again = lanes.acquire(&sid).await;
    }

    #[tokio::test]
    async fn different_sessions_do_not_block() {
        let lanes = SessionLanes::new();
        let _a = lanes.acquire(&SessionId::from_string("a")).await;
        let b = tokio::time::timeout(
            Duration::from_millis(50),
            lanes.acquire(&SessionId::from_string("b")),
        )
        .await;
        assert!(b.is_ok());
        assert_eq!(lanes.len(), 2);
    }

    #[tokio::test]
    async fn idle_lanes_are_pruned() {
        let lanes = SessionLanes::new();
        let held = lanes.acquire(&SessionId::from_string("held")).await;
        drop(lanes.acquire(&SessionId::from_string("idle")).await);

        assert_eq!(lanes.prune_idle(), 1);
        assert_eq!(lanes.len(), 1);
        drop(held);
        assert_eq!(lanes.prune_idle(), 1);
        assert!(lanes.is_empty());
    }
}
