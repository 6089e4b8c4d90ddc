use crate::types::AgentEvent;

/// Broadcast bus for agent and workflow events.
/// Every subscriber sees every event published after it subscribed.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: AgentEvent) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(AgentEvent::TurnComplete { turn: 2 });
        bus.publish(AgentEvent::RunStarted {
            session_id: SessionId::from_string("s1"),
        });

        assert!(matches!(rx.recv().await, Ok(AgentEvent::TurnComplete { turn: 2 })));
        assert!(matches!(rx.recv().await, Ok(AgentEvent::RunStarted { .. })));
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(AgentEvent::RunError {
            error: "nobody listening".into(),
        });
    }
}
