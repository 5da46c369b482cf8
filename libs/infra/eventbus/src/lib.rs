//! One `broadcast` channel per organization, created lazily on first
//! subscribe. Generalizes a single process-wide event channel to a
//! tenant-scoped registry so one organization's subscribers never see
//! another's events.

pub mod coalesce;

pub use coalesce::OutboundCoalescer;

use std::collections::HashMap;
use std::sync::Arc;

use aegis_domain_models::common::OrganizationId;
use aegis_domain_models::event::BusEvent;
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    channels: Arc<RwLock<HashMap<OrganizationId, broadcast::Sender<BusEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { channels: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Subscribes to `organization_id`'s channel, creating it if this is
    /// the first subscriber for that tenant.
    pub async fn subscribe(&self, organization_id: &OrganizationId) -> broadcast::Receiver<BusEvent> {
        if let Some(sender) = self.channels.read().await.get(organization_id) {
            return sender.subscribe();
        }

        let mut writer = self.channels.write().await;
        let sender = writer.entry(organization_id.clone()).or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Broadcasts to `organization_id`'s channel. A no-op (events simply
    /// discarded) if the tenant has no channel yet — nobody is
    /// subscribed, so there is nothing to coalesce or deliver.
    pub async fn publish(&self, organization_id: &OrganizationId, event: BusEvent) {
        let reader = self.channels.read().await;
        let Some(sender) = reader.get(organization_id) else {
            trace!("dropping event for organization [{organization_id}] with no active channel");
            return;
        };

        match sender.send(event) {
            Ok(subscriber_count) => trace!("broadcast to {subscriber_count} subscriber(s) in org [{organization_id}]"),
            Err(_) => trace!("no active receivers in org [{organization_id}], event discarded"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_domain_models::connection::Platform;
    use chrono::Utc;

    fn sample_event() -> BusEvent {
        BusEvent::ConnectionUpdate {
            connection_id: "conn-1".to_string(),
            status: "active".to_string(),
            platform: Platform::Slack,
            at: Utc::now(),
            error: None,
        }
    }

    #[tokio::test]
    async fn subscribers_in_different_organizations_are_isolated() {
        let bus = EventBus::new();
        let mut org_a = bus.subscribe(&"org-a".to_string()).await;
        let mut org_b = bus.subscribe(&"org-b".to_string()).await;

        bus.publish(&"org-a".to_string(), sample_event()).await;

        assert!(org_a.try_recv().is_ok());
        assert!(org_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(&"org-a".to_string(), sample_event()).await;
    }

    #[tokio::test]
    async fn second_subscriber_reuses_the_same_channel() {
        let bus = EventBus::new();
        let mut first = bus.subscribe(&"org-a".to_string()).await;
        let mut second = bus.subscribe(&"org-a".to_string()).await;

        bus.publish(&"org-a".to_string(), sample_event()).await;

        assert!(first.try_recv().is_ok());
        assert!(second.try_recv().is_ok());
    }
}
