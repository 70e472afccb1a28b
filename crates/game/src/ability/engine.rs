use std::collections::HashMap;

use crate::constants::{BUFFER_OPEN_MS, GCD_MS, INTERNAL_COOLDOWN_MS};
use crate::event::{EffectOutcome, EventLog, GameEvent, InterruptReason};
use crate::mob::{MobId, Mobs};
use crate::physics::CollisionWorld;
use crate::status::StatusSnapshot;
use crate::targeting::{self, Actor, Candidate, Resolution};

use super::def::{AbilityBook, AbilityDef, AbilityEffect, TAG_ATTACK, TAG_MOVEMENT, TAG_SPELL};
use super::request::{
    AbilityAck, AbilityCancelRequest, AbilityUseRequest, CancelReason, RejectReason,
};
use super::result::{AbilityResult, CastRng, OutcomeKind, TargetOutcome, cast_seed};

const LOS_EYE_HEIGHT: f32 = 1.5;

#[derive(Debug, Clone)]
pub struct ActiveCast {
    pub cast_id: u64,
    pub actor_id: MobId,
    pub ability_id: String,
    pub request_id: String,
    pub sequence: u64,
    pub server_tick: u64,
    pub cast_start_time_ms: u64,
    pub cast_end_time_ms: u64,
    pub result: AbilityResult,
}

#[derive(Debug, Clone)]
pub struct BufferedRequest {
    pub request: AbilityUseRequest,
    pub received_at_ms: u64,
    pub server_tick: u64,
}

/// A cast that completed this tick, handed to the combat engine.
#[derive(Debug, Clone)]
pub struct ResolvedCast {
    pub cast_id: u64,
    pub actor_id: MobId,
    pub ability_id: String,
    pub success: bool,
    pub outcomes: Vec<TargetOutcome>,
    pub died: Vec<MobId>,
}

/// Validation, one-slot request buffering, the cast state machine, and
/// deterministic tick resolution.
pub struct AbilityEngine {
    book: AbilityBook,
    active: HashMap<MobId, ActiveCast>,
    buffered: HashMap<MobId, BufferedRequest>,
    next_cast_id: u64,
    acks: Vec<(MobId, AbilityAck)>,
}

impl AbilityEngine {
    pub fn new(book: AbilityBook) -> Self {
        Self {
            book,
            active: HashMap::new(),
            buffered: HashMap::new(),
            next_cast_id: 1,
            acks: Vec::new(),
        }
    }

    pub fn book(&self) -> &AbilityBook {
        &self.book
    }

    pub fn active_cast(&self, actor_id: MobId) -> Option<&ActiveCast> {
        self.active.get(&actor_id)
    }

    pub fn buffered_request(&self, actor_id: MobId) -> Option<&BufferedRequest> {
        self.buffered.get(&actor_id)
    }

    /// Exactly one ack per use request ends up here; the zone routes them to
    /// the owning sessions (NPC acks are discarded there).
    pub fn drain_acks(&mut self) -> Vec<(MobId, AbilityAck)> {
        std::mem::take(&mut self.acks)
    }

    pub fn handle_request(
        &mut self,
        request: AbilityUseRequest,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        collision: &dyn CollisionWorld,
        log: &mut EventLog,
    ) {
        let actor_id = request.actor_id;
        let Some(actor) = mobs.get(actor_id) else {
            log::warn!("ability request from unknown actor {actor_id}");
            return;
        };
        if !actor.is_alive() {
            self.reject(&request, now_ms, server_tick, RejectReason::Illegal);
            return;
        }
        let gcd_end = actor.ability_state.gcd_end_time_ms;

        let Some(ability) = self.book.get(&request.ability_id).cloned() else {
            self.reject(&request, now_ms, server_tick, RejectReason::Illegal);
            return;
        };

        let active_cast_end = self.active.get(&actor_id).map(|c| c.cast_end_time_ms);
        if let Some(cast_end) = active_cast_end {
            // Mid-cast: only on-GCD abilities may queue into the buffer slot.
            if !ability.on_gcd {
                self.reject(&request, now_ms, server_tick, RejectReason::Illegal);
                return;
            }
            if self.buffered.contains_key(&actor_id) {
                self.reject(&request, now_ms, server_tick, RejectReason::BufferFull);
                return;
            }
            if now_ms + BUFFER_OPEN_MS < cast_end {
                self.reject(&request, now_ms, server_tick, RejectReason::BufferWindowClosed);
                return;
            }
            match self.validate(&request, &ability, mobs, collision, now_ms, true) {
                Ok(_) => {
                    self.buffered.insert(
                        actor_id,
                        BufferedRequest {
                            request,
                            received_at_ms: now_ms,
                            server_tick,
                        },
                    );
                }
                Err(reason) => self.reject(&request, now_ms, server_tick, reason),
            }
            return;
        }

        if ability.on_gcd && now_ms < gcd_end {
            if self.buffered.contains_key(&actor_id) {
                self.reject(&request, now_ms, server_tick, RejectReason::BufferFull);
                return;
            }
            if now_ms + BUFFER_OPEN_MS < gcd_end {
                self.reject(&request, now_ms, server_tick, RejectReason::BufferWindowClosed);
                return;
            }
            match self.validate(&request, &ability, mobs, collision, now_ms, true) {
                Ok(_) => {
                    self.buffered.insert(
                        actor_id,
                        BufferedRequest {
                            request,
                            received_at_ms: now_ms,
                            server_tick,
                        },
                    );
                }
                Err(reason) => self.reject(&request, now_ms, server_tick, reason),
            }
            return;
        }

        match self.validate(&request, &ability, mobs, collision, now_ms, false) {
            Ok(resolution) => {
                self.accept(request, &ability, resolution, now_ms, server_tick, mobs, log);
            }
            Err(reason) => self.reject(&request, now_ms, server_tick, reason),
        }
    }

    /// Cancels are idempotent and never produce an ack.
    pub fn handle_cancel(
        &mut self,
        cancel: &AbilityCancelRequest,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        log: &mut EventLog,
    ) {
        let reason = match cancel.reason {
            CancelReason::Movement => InterruptReason::Movement,
            CancelReason::Manual => InterruptReason::Manual,
            CancelReason::Other => InterruptReason::Other,
        };
        self.interrupt(cancel.actor_id, reason, now_ms, server_tick, mobs, log);
    }

    /// Clears the active cast and buffer slot. An interrupted cast zeroes the
    /// GCD and internal-cooldown gates and is logged.
    pub fn interrupt(
        &mut self,
        actor_id: MobId,
        reason: InterruptReason,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        log: &mut EventLog,
    ) {
        self.buffered.remove(&actor_id);
        let cast = self.active.remove(&actor_id);

        let mut source_location = None;
        if let Some(actor) = mobs.get_mut(actor_id) {
            source_location = Some(actor.position.to_array());
            if cast.is_some() {
                actor.ability_state.clear_cast();
                actor.ability_state.gcd_start_time_ms = 0;
                actor.ability_state.gcd_end_time_ms = 0;
                actor.ability_state.internal_cooldown_end_time_ms = 0;
            }
        }

        if let Some(cast) = cast {
            log.append(
                server_tick,
                now_ms,
                source_location,
                GameEvent::AbilityCastInterrupt {
                    cast_id: cast.cast_id,
                    actor_id,
                    ability_id: cast.ability_id,
                    reason,
                },
            );
        }
    }

    /// Advances the cast machine: resolves completed casts in deterministic
    /// order, then releases buffered requests whose gates opened.
    pub fn fixed_tick(
        &mut self,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        collision: &dyn CollisionWorld,
        log: &mut EventLog,
    ) -> Vec<ResolvedCast> {
        let mut due: Vec<MobId> = self
            .active
            .iter()
            .filter(|(_, c)| now_ms >= c.cast_end_time_ms)
            .map(|(&id, _)| id)
            .collect();
        due.sort_by(|a, b| {
            let ca = &self.active[a];
            let cb = &self.active[b];
            ca.cast_end_time_ms
                .cmp(&cb.cast_end_time_ms)
                .then(ca.server_tick.cmp(&cb.server_tick))
                .then(ca.sequence.cmp(&cb.sequence))
        });

        let mut resolved = Vec::with_capacity(due.len());
        for actor_id in due {
            if let Some(cast) = self.active.remove(&actor_id) {
                resolved.push(self.resolve_cast(cast, now_ms, server_tick, mobs, log));
            }
        }

        self.promote_buffered(now_ms, server_tick, mobs, collision, log);

        resolved
    }

    fn promote_buffered(
        &mut self,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        collision: &dyn CollisionWorld,
        log: &mut EventLog,
    ) {
        for actor_id in mobs.ids() {
            if !self.buffered.contains_key(&actor_id) || self.active.contains_key(&actor_id) {
                continue;
            }

            let Some(actor) = mobs.get(actor_id) else {
                self.buffered.remove(&actor_id);
                continue;
            };
            let gcd_end = actor.ability_state.gcd_end_time_ms;
            let alive = actor.is_alive();

            let buffered = &self.buffered[&actor_id];
            let request = buffered.request.clone();

            let ability = match self.book.get(&request.ability_id) {
                Some(a) if a.on_gcd => a.clone(),
                // A buffered off-GCD or unknown ability means the admission
                // validation was wrong; surface as illegal, keep ticking.
                _ => {
                    self.buffered.remove(&actor_id);
                    self.reject(&request, now_ms, server_tick, RejectReason::Illegal);
                    continue;
                }
            };

            if !alive {
                self.buffered.remove(&actor_id);
                self.reject(&request, now_ms, server_tick, RejectReason::Illegal);
                continue;
            }

            if now_ms < gcd_end {
                continue;
            }

            self.buffered.remove(&actor_id);
            match self.validate(&request, &ability, mobs, collision, now_ms, false) {
                Ok(resolution) => {
                    self.accept(request, &ability, resolution, now_ms, server_tick, mobs, log);
                }
                Err(reason) => self.reject(&request, now_ms, server_tick, reason),
            }
        }
    }

    /// Rejection checks run in a fixed order: illegal, status gates,
    /// cooldowns, resources, range and line of sight.
    fn validate(
        &self,
        request: &AbilityUseRequest,
        ability: &AbilityDef,
        mobs: &Mobs,
        collision: &dyn CollisionWorld,
        now_ms: u64,
        ignore_gcd: bool,
    ) -> Result<Resolution, RejectReason> {
        let Some(actor) = mobs.get(request.actor_id) else {
            return Err(RejectReason::Illegal);
        };

        let candidates: Vec<Candidate> = mobs
            .iter()
            .map(|m| Candidate {
                id: m.id,
                position: m.position,
                faction_id: m.faction_id,
                alive: m.is_alive(),
            })
            .collect();
        let resolution = targeting::resolve_targets(
            ability.target_type,
            ability.aoe_shape,
            ability.direction_mode,
            &Actor {
                id: actor.id,
                position: actor.position,
                facing_yaw: actor.facing_yaw,
                faction_id: actor.faction_id,
            },
            &request.target,
            &candidates,
        )
        .map_err(|_| RejectReason::Illegal)?;

        let flags = actor.statuses.flags();
        if flags.contains(crate::status::StateFlags::STUNNED) {
            return Err(RejectReason::Stunned);
        }
        if flags.contains(crate::status::StateFlags::SILENCED) && ability.has_tag(TAG_SPELL) {
            return Err(RejectReason::Silenced);
        }
        if flags.contains(crate::status::StateFlags::DISARMED) && ability.has_tag(TAG_ATTACK) {
            return Err(RejectReason::Disarmed);
        }
        if flags.contains(crate::status::StateFlags::ROOTED) && ability.has_tag(TAG_MOVEMENT) {
            return Err(RejectReason::Rooted);
        }
        if actor.statuses.blocks_any_tag(&ability.tags) {
            return Err(RejectReason::Other);
        }

        let state = &actor.ability_state;
        if ability.on_gcd && !ignore_gcd && now_ms < state.gcd_end_time_ms {
            return Err(RejectReason::Cooldown);
        }
        if now_ms < state.internal_cooldown_end_time_ms {
            return Err(RejectReason::Cooldown);
        }
        if actor
            .cooldowns
            .get(&ability.id)
            .is_some_and(|&ready_at| now_ms < ready_at)
        {
            return Err(RejectReason::Cooldown);
        }

        if !ability.cost.can_pay(&actor.resources) {
            return Err(RejectReason::Resources);
        }

        let distance = actor.position.distance(resolution.target_position);
        if distance > ability.range {
            return Err(RejectReason::OutOfRange);
        }
        if ability.requires_los && distance > f32::EPSILON {
            let eye = glam::Vec3::Y * LOS_EYE_HEIGHT;
            if !collision.line_of_sight(actor.position + eye, resolution.target_position + eye) {
                return Err(RejectReason::OutOfRange);
            }
        }

        Ok(resolution)
    }

    fn accept(
        &mut self,
        request: AbilityUseRequest,
        ability: &AbilityDef,
        resolution: Resolution,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        log: &mut EventLog,
    ) {
        let result = self.precompute(&request, ability, &resolution, server_tick, mobs);

        let cast_id = self.next_cast_id;
        self.next_cast_id += 1;

        let cast_start_time_ms = now_ms;
        let cast_end_time_ms = now_ms + ability.cast_time_ms;
        let gcd_window = ability
            .on_gcd
            .then(|| (now_ms, now_ms + GCD_MS.max(ability.cast_time_ms)));

        let Some(actor) = mobs.get_mut(request.actor_id) else {
            return;
        };
        let state = &mut actor.ability_state;
        state.cast_start_time_ms = cast_start_time_ms;
        state.cast_end_time_ms = cast_end_time_ms;
        state.cast_ability_id = ability.id.clone();
        state.cast_id = cast_id;
        if let Some((start, end)) = gcd_window {
            state.gcd_start_time_ms = start;
            state.gcd_end_time_ms = end;
        }
        if ability.cast_time_ms < INTERNAL_COOLDOWN_MS {
            state.internal_cooldown_end_time_ms = now_ms + INTERNAL_COOLDOWN_MS;
        }
        if ability.cooldown_ms > 0 {
            actor
                .cooldowns
                .insert(ability.id.clone(), now_ms + ability.cooldown_ms);
        }
        let source_location = actor.position.to_array();

        log.append(
            server_tick,
            now_ms,
            Some(source_location),
            GameEvent::AbilityCastStart {
                cast_id,
                actor_id: request.actor_id,
                ability_id: ability.id.clone(),
                cast_start_time_ms,
                cast_end_time_ms,
                gcd_start_time_ms: gcd_window.map(|(s, _)| s),
                gcd_end_time_ms: gcd_window.map(|(_, e)| e),
            },
        );

        self.acks.push((
            request.actor_id,
            AbilityAck::accepted(
                &request,
                now_ms,
                server_tick,
                cast_start_time_ms,
                cast_end_time_ms,
                gcd_window,
            ),
        ));

        self.active.insert(
            request.actor_id,
            ActiveCast {
                cast_id,
                actor_id: request.actor_id,
                ability_id: ability.id.clone(),
                request_id: request.request_id,
                sequence: request.sequence,
                server_tick,
                cast_start_time_ms,
                cast_end_time_ms,
                result,
            },
        );
    }

    /// Deterministic use-check and per-target outcomes, seeded by a stable
    /// hash of the request identity.
    fn precompute(
        &self,
        request: &AbilityUseRequest,
        ability: &AbilityDef,
        resolution: &Resolution,
        server_tick: u64,
        mobs: &Mobs,
    ) -> AbilityResult {
        let mut rng = CastRng::new(cast_seed(
            &request.request_id,
            request.actor_id,
            server_tick,
        ));
        let success = rng.next_f32() < ability.use_chance;

        let actor_stats = mobs
            .get(request.actor_id)
            .map(|m| *m.derived())
            .unwrap_or_else(|| {
                *crate::stats::StatsController::new(&crate::stats::PrimaryStats::default())
                    .derived()
            });

        let mut outcomes = Vec::new();
        for (effect_index, effect) in ability.effects.iter().enumerate() {
            for &target_id in &resolution.targets {
                let immune = mobs
                    .get(target_id)
                    .is_some_and(|t| t.statuses.is_immune_to_any(&ability.tags));

                let kind = if !success || immune {
                    OutcomeKind::NoEffect
                } else {
                    match effect {
                        AbilityEffect::Damage {
                            base,
                            scale_stat,
                            scale,
                        } => {
                            let amount =
                                AbilityEffect::scaled_amount(*base, *scale_stat, *scale, &actor_stats)
                                    * rng.next_range(0.9, 1.1);
                            OutcomeKind::Damage {
                                amount: amount.max(0.0),
                            }
                        }
                        AbilityEffect::Heal {
                            base,
                            scale_stat,
                            scale,
                        } => {
                            let amount =
                                AbilityEffect::scaled_amount(*base, *scale_stat, *scale, &actor_stats)
                                    * rng.next_range(0.9, 1.1);
                            OutcomeKind::Heal {
                                amount: amount.max(0.0),
                            }
                        }
                        AbilityEffect::ApplyStatus {
                            status,
                            max_duration_ms,
                        } => {
                            let duration_ms = if *max_duration_ms > 0 {
                                status.duration_ms.min(*max_duration_ms)
                            } else {
                                status.duration_ms
                            };
                            OutcomeKind::Status {
                                def: status.clone(),
                                duration_ms,
                            }
                        }
                    }
                };
                outcomes.push(TargetOutcome {
                    target_id,
                    effect_index,
                    kind,
                });
            }
        }

        AbilityResult {
            success,
            target_position: resolution.target_position,
            outcomes,
        }
    }

    fn resolve_cast(
        &mut self,
        cast: ActiveCast,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        log: &mut EventLog,
    ) -> ResolvedCast {
        let mut source_location = None;
        let actor_stats = mobs.get(cast.actor_id).map(|m| *m.derived());
        if let Some(actor) = mobs.get_mut(cast.actor_id) {
            actor.ability_state.clear_cast();
            if let Some(ability) = self.book.get(&cast.ability_id) {
                ability.cost.pay(&mut actor.resources);
            }
            source_location = Some(actor.position.to_array());
        }

        log.append(
            server_tick,
            now_ms,
            source_location,
            GameEvent::AbilityCastFinish {
                cast_id: cast.cast_id,
                actor_id: cast.actor_id,
                ability_id: cast.ability_id.clone(),
            },
        );

        for outcome in &cast.result.outcomes {
            log.append(
                server_tick,
                now_ms,
                source_location,
                GameEvent::AbilityEffectApplied {
                    cast_id: cast.cast_id,
                    actor_id: cast.actor_id,
                    ability_id: cast.ability_id.clone(),
                    target_id: outcome.target_id,
                    outcome: replicated_outcome(&outcome.kind),
                },
            );
        }

        let mut died = Vec::new();
        for outcome in &cast.result.outcomes {
            let Some(target) = mobs.get_mut(outcome.target_id) else {
                continue;
            };
            if !target.is_alive() {
                continue;
            }
            match &outcome.kind {
                OutcomeKind::Damage { amount } => {
                    target.apply_hp_delta(-amount);
                    if !target.is_alive() {
                        died.push(outcome.target_id);
                    }
                }
                OutcomeKind::Heal { amount } => {
                    target.apply_hp_delta(*amount);
                }
                OutcomeKind::Status { def, duration_ms } => {
                    let snapshot = StatusSnapshot {
                        source_stats: actor_stats.unwrap_or(*target.derived()),
                        target_stats: *target.derived(),
                    };
                    target
                        .statuses
                        .apply(def, cast.actor_id, snapshot, now_ms, *duration_ms);
                    target.refresh_stats();
                }
                OutcomeKind::NoEffect => {}
            }
        }

        ResolvedCast {
            cast_id: cast.cast_id,
            actor_id: cast.actor_id,
            ability_id: cast.ability_id,
            success: cast.result.success,
            outcomes: cast.result.outcomes,
            died,
        }
    }

    fn reject(
        &mut self,
        request: &AbilityUseRequest,
        now_ms: u64,
        server_tick: u64,
        reason: RejectReason,
    ) {
        self.acks.push((
            request.actor_id,
            AbilityAck::rejected(request, now_ms, server_tick, reason),
        ));
    }
}

fn replicated_outcome(kind: &OutcomeKind) -> EffectOutcome {
    match kind {
        OutcomeKind::Damage { amount } => EffectOutcome::Damage { amount: *amount },
        OutcomeKind::Heal { amount } => EffectOutcome::Heal { amount: *amount },
        OutcomeKind::Status { def, .. } => EffectOutcome::Status {
            status_id: def.id.clone(),
        },
        OutcomeKind::NoEffect => EffectOutcome::NoEffect,
    }
}
