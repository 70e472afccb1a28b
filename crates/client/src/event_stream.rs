use std::collections::VecDeque;

use stormreach::event::EventLogEntry;
use stormreach::net::EventStreamBatchMessage;

/// Where a batch came from; live batches may trigger a resync request,
/// resync responses settle one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSource {
    Live,
    Resync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncRequest {
    pub since_event_id: u64,
}

/// Gap-detection and pending-queue partner of the server's event log ring
/// buffer.
#[derive(Debug, Default)]
pub struct EventStreamClient {
    last_event_id: Option<u64>,
    resync_in_flight: bool,
    pending: VecDeque<EventLogEntry>,
}

impl EventStreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_event_id(&self) -> Option<u64> {
        self.last_event_id
    }

    pub fn resync_in_flight(&self) -> bool {
        self.resync_in_flight
    }

    /// Ingests a batch. Returns a resync request when a gap is detected on a
    /// source that permits one.
    pub fn on_batch(
        &mut self,
        batch: &EventStreamBatchMessage,
        source: BatchSource,
    ) -> Option<ResyncRequest> {
        let mut baseline = match self.last_event_id {
            Some(id) => id,
            None => batch.from_event_id.saturating_sub(1),
        };

        if batch.from_event_id > baseline + 1 {
            match source {
                BatchSource::Live if !self.resync_in_flight => {
                    log::debug!(
                        "event stream gap: batch starts at {} with baseline {}",
                        batch.from_event_id,
                        baseline
                    );
                    self.resync_in_flight = true;
                    return Some(ResyncRequest {
                        since_event_id: baseline,
                    });
                }
                BatchSource::Live => {
                    // a resync is already on the wire; it will cover this gap
                    return None;
                }
                BatchSource::Resync => {
                    baseline = batch.from_event_id - 1;
                }
            }
        }

        for entry in &batch.events {
            if entry.event_id > baseline {
                self.pending.push_back(entry.clone());
            }
        }
        self.last_event_id = Some(batch.to_event_id);
        if source == BatchSource::Resync {
            self.resync_in_flight = false;
        }
        None
    }

    pub fn drain_pending(&mut self) -> Vec<EventLogEntry> {
        self.pending.drain(..).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stormreach::event::{EventCategory, GameEvent};

    fn entry(event_id: u64) -> EventLogEntry {
        EventLogEntry {
            event_id,
            category: EventCategory::Combat,
            server_tick: 0,
            server_time_ms: 0,
            context_id: 0,
            source_location: None,
            event: GameEvent::MobEnterCombat { mob_id: 1 },
        }
    }

    fn batch(from: u64, to: u64) -> EventStreamBatchMessage {
        EventStreamBatchMessage {
            from_event_id: from,
            to_event_id: to,
            server_tick: 0,
            events: (from..=to).map(entry).collect(),
        }
    }

    #[test]
    fn contiguous_batches_flow_through() {
        let mut client = EventStreamClient::new();

        assert!(client.on_batch(&batch(1, 5), BatchSource::Live).is_none());
        assert!(client.on_batch(&batch(6, 9), BatchSource::Live).is_none());

        assert_eq!(client.last_event_id(), Some(9));
        let ids: Vec<u64> = client.drain_pending().iter().map(|e| e.event_id).collect();
        assert_eq!(ids, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn first_batch_mid_stream_sets_baseline() {
        let mut client = EventStreamClient::new();
        assert!(client.on_batch(&batch(30, 40), BatchSource::Live).is_none());
        assert_eq!(client.drain_pending().len(), 11);
    }

    #[test]
    fn gap_triggers_resync_once() {
        let mut client = EventStreamClient::new();
        client.on_batch(&batch(1, 5), BatchSource::Live);

        let request = client.on_batch(&batch(30, 40), BatchSource::Live);
        assert_eq!(request, Some(ResyncRequest { since_event_id: 5 }));
        assert!(client.resync_in_flight());
        // the gapped batch was not ingested
        assert_eq!(client.last_event_id(), Some(5));

        // further gapped batches stay quiet while the resync is in flight
        assert!(client.on_batch(&batch(41, 45), BatchSource::Live).is_none());

        // the resync response covers everything and clears the flag
        assert!(client.on_batch(&batch(6, 45), BatchSource::Resync).is_none());
        assert!(!client.resync_in_flight());
        assert_eq!(client.last_event_id(), Some(45));
        let ids: Vec<u64> = client.drain_pending().iter().map(|e| e.event_id).collect();
        assert_eq!(ids.first(), Some(&1));
        assert_eq!(ids.last(), Some(&45));
    }

    #[test]
    fn resync_with_evicted_tail_adopts_new_baseline() {
        let mut client = EventStreamClient::new();
        client.on_batch(&batch(1, 5), BatchSource::Live);
        client.on_batch(&batch(90, 95), BatchSource::Live);

        // the server could only serve from 50 onward
        assert!(client.on_batch(&batch(50, 95), BatchSource::Resync).is_none());
        assert_eq!(client.last_event_id(), Some(95));
        let ids: Vec<u64> = client.drain_pending().iter().map(|e| e.event_id).collect();
        assert_eq!(ids.first(), Some(&1));
        assert!(ids.contains(&50));
    }

    #[test]
    fn duplicate_entries_below_baseline_are_skipped() {
        let mut client = EventStreamClient::new();
        client.on_batch(&batch(1, 5), BatchSource::Live);
        client.drain_pending();

        // overlapping redelivery
        client.on_batch(&batch(4, 8), BatchSource::Live);
        let ids: Vec<u64> = client.drain_pending().iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![6, 7, 8]);
    }
}
