use std::collections::VecDeque;

use stormreach::ability::{AbilityAck, AbilityDef, RejectReason};
use stormreach::constants::{GCD_MS, INTERNAL_COOLDOWN_MS, MAX_TRACKED_REQUEST_PREDICTIONS};

#[derive(Debug, Clone)]
struct RequestPrediction {
    request_id: String,
    ability_id: String,
    applies_optimistic_cooldowns: bool,
}

/// Client-side mirror of the server's cooldown gates: predicted GCD,
/// internal-cooldown, and per-ability windows, reconciled against acks.
#[derive(Debug, Default)]
pub struct AbilityPrediction {
    predicted_gcd_start_time_ms: u64,
    predicted_gcd_end_time_ms: u64,
    predicted_internal_cooldown_end_time_ms: u64,
    cooldowns: Vec<(String, u64, u64)>,
    tracked: VecDeque<RequestPrediction>,
    last_ack: Option<(u64, String)>,
    queued_ability: Option<String>,
    active_cast_id: Option<u64>,
}

impl AbilityPrediction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predicted_gcd_end_time_ms(&self) -> u64 {
        self.predicted_gcd_end_time_ms
    }

    pub fn predicted_internal_cooldown_end_time_ms(&self) -> u64 {
        self.predicted_internal_cooldown_end_time_ms
    }

    pub fn cooldown_window(&self, ability_id: &str) -> Option<(u64, u64)> {
        self.cooldowns
            .iter()
            .find(|(id, _, _)| id == ability_id)
            .map(|&(_, start, end)| (start, end))
    }

    pub fn queued_ability(&self) -> Option<&str> {
        self.queued_ability.as_deref()
    }

    pub fn set_queued_ability(&mut self, ability_id: &str) {
        self.queued_ability = Some(ability_id.to_string());
    }

    /// Gate for firing a request right now.
    pub fn can_attempt(&self, ability: &AbilityDef, now_ms: u64) -> bool {
        if ability.on_gcd && now_ms < self.predicted_gcd_end_time_ms {
            return false;
        }
        if now_ms < self.predicted_internal_cooldown_end_time_ms {
            return false;
        }
        if let Some((_, end)) = self.cooldown_window(&ability.id) {
            if now_ms < end {
                return false;
            }
        }
        true
    }

    /// Gate for queueing into the buffer window: only the ability's own
    /// cooldown interval blocks it.
    pub fn can_buffer(&self, ability: &AbilityDef, now_ms: u64) -> bool {
        match self.cooldown_window(&ability.id) {
            Some((start, end)) => !(now_ms >= start && now_ms < end),
            None => true,
        }
    }

    /// Optimistically applies the gates a successful accept would set, and
    /// tracks the request for later reconciliation.
    pub fn on_request(&mut self, request_id: &str, ability: &AbilityDef, now_ms: u64) {
        let applies = ability.on_gcd || ability.cooldown_ms > 0;
        if ability.on_gcd {
            self.predicted_gcd_start_time_ms = now_ms;
            self.predicted_gcd_end_time_ms = now_ms + GCD_MS.max(ability.cast_time_ms);
        }
        if ability.cast_time_ms < INTERNAL_COOLDOWN_MS {
            self.predicted_internal_cooldown_end_time_ms = now_ms + INTERNAL_COOLDOWN_MS;
        }
        if ability.cooldown_ms > 0 {
            self.set_cooldown(&ability.id, now_ms, now_ms + ability.cooldown_ms);
        }

        self.tracked.push_back(RequestPrediction {
            request_id: request_id.to_string(),
            ability_id: ability.id.clone(),
            applies_optimistic_cooldowns: applies,
        });
        while self.tracked.len() > MAX_TRACKED_REQUEST_PREDICTIONS {
            self.tracked.pop_front();
        }
    }

    /// Reconciles one server ack. Stale acks (sequence regression, or a
    /// different request at the same sequence) are dropped without effect.
    pub fn apply_ack(&mut self, ack: &AbilityAck, ability: Option<&AbilityDef>, now_ms: u64) {
        if let Some((last_seq, last_request)) = &self.last_ack {
            if ack.sequence < *last_seq
                || (ack.sequence == *last_seq && ack.request_id != *last_request)
            {
                return;
            }
        }
        self.last_ack = Some((ack.sequence, ack.request_id.clone()));

        let tracked = self.take_tracked(&ack.request_id);

        if ack.accepted {
            if let Some(server_end) = ack.gcd_end_time_ms {
                if server_end < self.predicted_gcd_end_time_ms {
                    self.predicted_gcd_start_time_ms =
                        ack.gcd_start_time_ms.unwrap_or(ack.server_time_ms);
                    self.predicted_gcd_end_time_ms = server_end;
                }
            }
            let cast_time = ack
                .cast_end_time_ms
                .saturating_sub(ack.cast_start_time_ms);
            if cast_time < INTERNAL_COOLDOWN_MS {
                let server_icd_end = ack.cast_start_time_ms + INTERNAL_COOLDOWN_MS;
                if server_icd_end < self.predicted_internal_cooldown_end_time_ms {
                    self.predicted_internal_cooldown_end_time_ms = server_icd_end;
                }
            }
            if let Some(ability) = ability {
                if ability.cooldown_ms > 0 {
                    let server_end = ack.cast_start_time_ms + ability.cooldown_ms;
                    let tighter = self
                        .cooldown_window(&ability.id)
                        .is_none_or(|(_, end)| server_end < end);
                    if tighter {
                        self.set_cooldown(&ability.id, ack.cast_start_time_ms, server_end);
                    }
                }
            }
            self.queued_ability = None;
            return;
        }

        match ack.reject_reason {
            Some(
                RejectReason::Cooldown | RejectReason::BufferFull | RejectReason::BufferWindowClosed,
            ) => {
                // the gates were real; keep the optimistic windows
            }
            _ => {
                if let Some(tracked) = tracked {
                    if tracked.applies_optimistic_cooldowns {
                        self.roll_back(&tracked.ability_id, now_ms);
                    }
                }
            }
        }
    }

    /// A locally issued cancel clears the queued ability immediately.
    pub fn on_cancel(&mut self) {
        self.queued_ability = None;
    }

    pub fn on_cast_start(&mut self, cast_id: u64) {
        self.active_cast_id = Some(cast_id);
    }

    /// Server-originated interrupt: collapse the predicted gates for the
    /// matching cast.
    pub fn on_cast_interrupt(&mut self, cast_id: u64, now_ms: u64) {
        if self.active_cast_id == Some(cast_id) {
            self.active_cast_id = None;
            self.predicted_gcd_end_time_ms = self.predicted_gcd_end_time_ms.min(now_ms);
            self.predicted_internal_cooldown_end_time_ms =
                self.predicted_internal_cooldown_end_time_ms.min(now_ms);
        }
    }

    fn take_tracked(&mut self, request_id: &str) -> Option<RequestPrediction> {
        let index = self
            .tracked
            .iter()
            .position(|t| t.request_id == request_id)?;
        self.tracked.remove(index)
    }

    fn roll_back(&mut self, ability_id: &str, now_ms: u64) {
        self.predicted_gcd_end_time_ms = self.predicted_gcd_end_time_ms.min(now_ms);
        self.predicted_internal_cooldown_end_time_ms =
            self.predicted_internal_cooldown_end_time_ms.min(now_ms);
        if let Some(entry) = self
            .cooldowns
            .iter_mut()
            .find(|(id, _, _)| id == ability_id)
        {
            entry.2 = entry.2.min(now_ms);
        }
    }

    fn set_cooldown(&mut self, ability_id: &str, start: u64, end: u64) {
        if let Some(entry) = self
            .cooldowns
            .iter_mut()
            .find(|(id, _, _)| id == ability_id)
        {
            entry.1 = start;
            entry.2 = end;
        } else {
            self.cooldowns.push((ability_id.to_string(), start, end));
        }
    }
}
