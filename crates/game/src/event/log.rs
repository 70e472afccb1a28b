use std::collections::VecDeque;

use super::types::{EventLogEntry, GameEvent};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventLogError {
    #[error("requested tail evicted (oldest {oldest}, latest {latest})")]
    Evicted { oldest: u64, latest: u64 },
    #[error("range {lo}..={hi} outside stored {oldest}..={latest}")]
    OutOfRange {
        lo: u64,
        hi: u64,
        oldest: u64,
        latest: u64,
    },
}

/// Append-only sequence store of fixed capacity. The oldest entry is
/// overwritten once the buffer is full; readers that fall behind the
/// eviction horizon get a distinct signal and must resync.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<EventLogEntry>,
    capacity: usize,
    next_event_id: u64,
    context_id: u32,
}

impl EventLog {
    pub fn new(capacity: usize, context_id: u32) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_event_id: 1,
            context_id,
        }
    }

    pub fn append(
        &mut self,
        server_tick: u64,
        server_time_ms: u64,
        source_location: Option<[f32; 3]>,
        event: GameEvent,
    ) -> u64 {
        let event_id = self.next_event_id;
        self.next_event_id += 1;

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(EventLogEntry {
            event_id,
            category: event.category(),
            server_tick,
            server_time_ms,
            context_id: self.context_id,
            source_location,
            event,
        });

        event_id
    }

    pub fn latest(&self) -> u64 {
        self.next_event_id - 1
    }

    pub fn oldest(&self) -> Option<u64> {
        self.entries.front().map(|e| e.event_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with ids in `(after_seq, latest]`. Fails with `Evicted` when
    /// `after_seq` falls before the eviction horizon (`oldest - 1`).
    pub fn since(&self, after_seq: u64) -> Result<Vec<EventLogEntry>, EventLogError> {
        let Some(oldest) = self.oldest() else {
            return Ok(Vec::new());
        };

        if after_seq + 1 < oldest {
            return Err(EventLogError::Evicted {
                oldest,
                latest: self.latest(),
            });
        }

        Ok(self
            .entries
            .iter()
            .filter(|e| e.event_id > after_seq)
            .cloned()
            .collect())
    }

    /// Entries with ids in `[lo, hi]`, only if the full range is still stored.
    pub fn range(&self, lo: u64, hi: u64) -> Result<Vec<EventLogEntry>, EventLogError> {
        let oldest = self.oldest().unwrap_or(self.next_event_id);
        let latest = self.latest();

        if lo > hi || lo < oldest || hi > latest {
            return Err(EventLogError::OutOfRange {
                lo,
                hi,
                oldest,
                latest,
            });
        }

        Ok(self
            .entries
            .iter()
            .filter(|e| e.event_id >= lo && e.event_id <= hi)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append_n(log: &mut EventLog, n: u64) {
        for _ in 0..n {
            log.append(0, 0, None, GameEvent::MobEnterCombat { mob_id: 1 });
        }
    }

    #[test]
    fn ids_strictly_increasing_from_one() {
        let mut log = EventLog::new(8, 0);
        let a = log.append(1, 50, None, GameEvent::MobEnterCombat { mob_id: 1 });
        let b = log.append(1, 50, None, GameEvent::MobEnterCombat { mob_id: 2 });
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn since_on_empty_is_empty() {
        let log = EventLog::new(8, 0);
        assert_eq!(log.since(0).unwrap().len(), 0);
        assert_eq!(log.since(100).unwrap().len(), 0);
    }

    #[test]
    fn since_returns_open_interval() {
        let mut log = EventLog::new(8, 0);
        append_n(&mut log, 5);

        let entries = log.since(2).unwrap();
        let ids: Vec<u64> = entries.iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn since_signals_eviction() {
        let mut log = EventLog::new(4, 0);
        append_n(&mut log, 10);
        // stored ids are 7..=10

        assert_eq!(
            log.since(5),
            Err(EventLogError::Evicted {
                oldest: 7,
                latest: 10
            })
        );
        // oldest - 1 is still servable and returns everything stored
        assert_eq!(log.since(6).unwrap().len(), 4);
    }

    #[test]
    fn range_checks_bounds() {
        let mut log = EventLog::new(4, 0);
        append_n(&mut log, 6);
        // stored ids are 3..=6

        assert_eq!(log.range(3, 6).unwrap().len(), 4);
        assert_eq!(log.range(4, 5).unwrap().len(), 2);
        assert!(log.range(2, 5).is_err());
        assert!(log.range(4, 7).is_err());
        assert!(log.range(5, 4).is_err());
    }
}
