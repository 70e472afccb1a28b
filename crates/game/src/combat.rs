use std::collections::HashSet;

use crate::ability::{OutcomeKind, ResolvedCast};
use crate::constants::{DAMAGE_AGGRO_MULTIPLIER, HEALING_AGGRO_MULTIPLIER, STATUS_AGGRO_AMOUNT};
use crate::event::{EventLog, ExitCombatReason, GameEvent};
use crate::mob::{MobId, Mobs};
use crate::status::StatusCategory;

/// Reacts to resolved abilities: threat bookkeeping, in-combat flags, and
/// combat-enter/exit log entries.
#[derive(Debug, Default)]
pub struct CombatEngine;

impl CombatEngine {
    pub fn new() -> Self {
        Self
    }

    /// Only use-check successes generate threat or combat transitions.
    pub fn on_resolved(
        &mut self,
        resolved: &ResolvedCast,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        log: &mut EventLog,
    ) {
        if !resolved.success {
            return;
        }

        let actor_id = resolved.actor_id;
        let actor_faction = match mobs.get(actor_id) {
            Some(actor) => actor.faction_id,
            None => return,
        };
        let mut hostile_targets: Vec<MobId> = Vec::new();

        for outcome in &resolved.outcomes {
            let target_id = outcome.target_id;
            match &outcome.kind {
                OutcomeKind::Damage { amount } => {
                    let Some(target) = mobs.get_mut(target_id) else {
                        continue;
                    };
                    let hostile = target.faction_id != actor_faction;
                    if hostile {
                        if let Some(npc) = target.as_npc_mut() {
                            npc.aggro.add(actor_id, amount * DAMAGE_AGGRO_MULTIPLIER);
                        }
                        hostile_targets.push(target_id);
                    }
                }
                OutcomeKind::Heal { amount } => {
                    let is_ally = mobs
                        .get(target_id)
                        .is_some_and(|t| t.faction_id == actor_faction);
                    if is_ally {
                        self.propagate_to_threatened(
                            mobs,
                            target_id,
                            actor_id,
                            amount * HEALING_AGGRO_MULTIPLIER,
                        );
                    }
                }
                OutcomeKind::Status { def, .. } => {
                    let Some(target) = mobs.get(target_id) else {
                        continue;
                    };
                    let is_ally = target.faction_id == actor_faction;
                    match def.category {
                        StatusCategory::Buff if is_ally => {
                            self.propagate_to_threatened(
                                mobs,
                                target_id,
                                actor_id,
                                STATUS_AGGRO_AMOUNT,
                            );
                        }
                        StatusCategory::Debuff if !is_ally => {
                            if let Some(npc) =
                                mobs.get_mut(target_id).and_then(|t| t.as_npc_mut())
                            {
                                npc.aggro.add(actor_id, STATUS_AGGRO_AMOUNT);
                            }
                            hostile_targets.push(target_id);
                        }
                        _ => {}
                    }
                }
                OutcomeKind::NoEffect => {}
            }
        }

        if !hostile_targets.is_empty() {
            self.enter_combat(actor_id, now_ms, server_tick, mobs, log);
            for target_id in hostile_targets {
                self.enter_combat(target_id, now_ms, server_tick, mobs, log);
            }
        }
    }

    /// Healing and buff threat goes to every in-combat NPC whose table
    /// already references the assisted ally.
    fn propagate_to_threatened(
        &self,
        mobs: &mut Mobs,
        ally_id: MobId,
        actor_id: MobId,
        amount: f32,
    ) {
        for npc_id in mobs.npc_ids() {
            let Some(npc_mob) = mobs.get_mut(npc_id) else {
                continue;
            };
            if !npc_mob.in_combat {
                continue;
            }
            if let Some(npc) = npc_mob.as_npc_mut() {
                if npc.aggro.contains(ally_id) {
                    npc.aggro.add(actor_id, amount);
                }
            }
        }
    }

    fn enter_combat(
        &self,
        mob_id: MobId,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        log: &mut EventLog,
    ) {
        let Some(mob) = mobs.get_mut(mob_id) else {
            return;
        };
        mob.ability_state.last_hostile_action_time_ms = now_ms;
        if !mob.in_combat {
            mob.in_combat = true;
            let location = mob.position.to_array();
            log.append(
                server_tick,
                now_ms,
                Some(location),
                GameEvent::MobEnterCombat { mob_id },
            );
        }
    }

    /// Exit-combat sweep: prune threat tables against live combatants, then
    /// drop any mob the tables no longer tie to a fight.
    pub fn fixed_tick(
        &mut self,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        log: &mut EventLog,
    ) {
        let alive: HashSet<MobId> = mobs
            .iter()
            .filter(|m| m.is_alive())
            .map(|m| m.id)
            .collect();

        for npc_id in mobs.npc_ids() {
            if let Some(npc) = mobs.get_mut(npc_id).and_then(|m| m.as_npc_mut()) {
                npc.aggro.prune(|id| alive.contains(&id));
            }
        }

        let mut threatened: HashSet<MobId> = HashSet::new();
        for npc_id in mobs.npc_ids() {
            if let Some(npc) = mobs.get(npc_id).and_then(|m| m.as_npc()) {
                threatened.extend(npc.aggro.sources());
            }
        }

        for mob_id in mobs.ids() {
            let Some(mob) = mobs.get_mut(mob_id) else {
                continue;
            };
            if !mob.in_combat {
                continue;
            }

            let remain = match mob.as_npc() {
                Some(npc) => !npc.aggro.is_empty(),
                None => threatened.contains(&mob_id),
            };
            if remain {
                continue;
            }

            mob.in_combat = false;
            if let Some(npc) = mob.as_npc_mut() {
                npc.aggro.clear();
            }
            let location = mob.position.to_array();
            log.append(
                server_tick,
                now_ms,
                Some(location),
                GameEvent::MobExitCombat {
                    mob_id,
                    reason: ExitCombatReason::Timeout,
                },
            );
        }
    }
}
