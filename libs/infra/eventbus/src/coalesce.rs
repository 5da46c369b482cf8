// [libs/infra/eventbus/src/coalesce.rs]
use std::collections::HashMap;

use aegis_domain_models::event::BusEvent;

/// Buffers outbound frames for one websocket connection. Below
/// `threshold` every frame is queued as-is, preserving the strict
/// per-(tenant, connectionId) ordering `discovery:progress` requires.
/// Once the backlog crosses `threshold`, coalescible frames (currently
/// `discovery:progress` / `connection:update`) are collapsed in place to
/// last-value-per-(connection, kind); everything else — notably
/// `automation:discovered` — is always appended and never dropped.
pub struct OutboundCoalescer {
    threshold: usize,
    queue: Vec<BusEvent>,
    coalesced_positions: HashMap<(String, &'static str), usize>,
}

impl OutboundCoalescer {
    pub fn new(threshold: usize) -> Self {
        Self { threshold, queue: Vec::new(), coalesced_positions: HashMap::new() }
    }

    pub fn push(&mut self, event: BusEvent) {
        if self.queue.len() < self.threshold {
            self.queue.push(event);
            return;
        }

        if let Some(key) = event.coalesce_key() {
            if let Some(&position) = self.coalesced_positions.get(&key) {
                self.queue[position] = event;
                return;
            }
            self.coalesced_positions.insert(key, self.queue.len());
        }

        self.queue.push(event);
    }

    pub fn drain(&mut self) -> Vec<BusEvent> {
        self.coalesced_positions.clear();
        std::mem::take(&mut self.queue)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_domain_models::connection::Platform;
    use chrono::Utc;

    fn progress(connection_id: &str, progress: u8) -> BusEvent {
        BusEvent::DiscoveryProgress {
            connection_id: connection_id.to_string(),
            progress,
            status: "running".to_string(),
            items_found: 0,
            stage: None,
            at: Utc::now(),
        }
    }

    fn discovered(automation_id: &str) -> BusEvent {
        BusEvent::AutomationDiscovered {
            automation_id: automation_id.to_string(),
            name: "test app".to_string(),
            platform: Platform::Slack,
            risk_level: aegis_domain_models::risk_assessment::OverallRisk::Low,
            at: Utc::now(),
            risk_score: None,
            automation_type: None,
        }
    }

    #[test]
    fn below_threshold_every_frame_is_kept() {
        let mut coalescer = OutboundCoalescer::new(10);
        coalescer.push(progress("conn-1", 10));
        coalescer.push(progress("conn-1", 20));
        assert_eq!(coalescer.len(), 2);
    }

    #[test]
    fn over_threshold_progress_frames_collapse_to_last_value() {
        let mut coalescer = OutboundCoalescer::new(0);
        coalescer.push(progress("conn-1", 10));
        coalescer.push(progress("conn-1", 50));
        coalescer.push(progress("conn-1", 90));

        let drained = coalescer.drain();
        assert_eq!(drained.len(), 1);
        match &drained[0] {
            BusEvent::DiscoveryProgress { progress, .. } => assert_eq!(*progress, 90),
            other => panic!("expected DiscoveryProgress, got {other:?}"),
        }
    }

    #[test]
    fn over_threshold_automation_discovered_is_never_dropped() {
        let mut coalescer = OutboundCoalescer::new(0);
        coalescer.push(progress("conn-1", 10));
        coalescer.push(discovered("auto-1"));
        coalescer.push(progress("conn-1", 50));
        coalescer.push(discovered("auto-2"));

        let drained = coalescer.drain();
        let discovered_count = drained.iter().filter(|e| matches!(e, BusEvent::AutomationDiscovered { .. })).count();
        assert_eq!(discovered_count, 2);
    }

    #[test]
    fn distinct_connections_coalesce_independently() {
        let mut coalescer = OutboundCoalescer::new(0);
        coalescer.push(progress("conn-1", 10));
        coalescer.push(progress("conn-2", 20));
        coalescer.push(progress("conn-1", 99));

        let drained = coalescer.drain();
        assert_eq!(drained.len(), 2);
    }
}
