use std::sync::Arc;

use glam::Vec3;

use stormreach::ability::{AbilityBook, AbilityCost, AbilityDef, AbilityEffect};
use stormreach::constants::{GCD_MS, NPC_RESPAWN_DELAY_MS, PLAYER_SPEED, TICK_MS};
use stormreach::event::GameEvent;
use stormreach::net::{
    AbilityUseMessage, ClientMessage, MoveMessage, ServerMessage,
};
use stormreach::physics::FlatWorld;
use stormreach::targeting::{AoeShape, DirectionMode, TargetType};
use stormreach::zone::{NpcSpawnDef, Zone, ZoneDefinition};
use stormreach::{MobId, RejectReason};

fn ability_book() -> AbilityBook {
    AbilityBook::from_defs(vec![
        AbilityDef {
            id: "long_cast".into(),
            name: "Long Cast".into(),
            cast_time_ms: 3000,
            cooldown_ms: 0,
            on_gcd: true,
            range: 30.0,
            cost: AbilityCost::default(),
            target_type: TargetType::Enemy,
            aoe_shape: AoeShape::Single,
            direction_mode: DirectionMode::Target,
            effects: vec![AbilityEffect::Damage {
                base: 30.0,
                scale_stat: None,
                scale: 0.0,
            }],
            tags: vec!["spell".into()],
            use_chance: 1.0,
            requires_los: true,
        },
        AbilityDef {
            id: "shield_bash".into(),
            name: "Shield Bash".into(),
            cast_time_ms: 0,
            cooldown_ms: 2500,
            on_gcd: true,
            range: 6.0,
            cost: AbilityCost::default(),
            target_type: TargetType::Enemy,
            aoe_shape: AoeShape::Single,
            direction_mode: DirectionMode::Target,
            effects: vec![AbilityEffect::Damage {
                base: 15.0,
                scale_stat: None,
                scale: 0.0,
            }],
            tags: vec!["attack".into()],
            use_chance: 1.0,
            requires_los: true,
        },
        AbilityDef {
            id: "claw".into(),
            name: "Claw".into(),
            cast_time_ms: 0,
            cooldown_ms: 1000,
            on_gcd: true,
            range: 3.0,
            cost: AbilityCost::default(),
            target_type: TargetType::Enemy,
            aoe_shape: AoeShape::Single,
            direction_mode: DirectionMode::Target,
            effects: vec![AbilityEffect::Damage {
                base: 8.0,
                scale_stat: None,
                scale: 0.0,
            }],
            tags: vec!["attack".into()],
            use_chance: 1.0,
            requires_los: true,
        },
    ])
}

fn zone_with(world: FlatWorld, npcs: Vec<NpcSpawnDef>) -> Zone {
    let world = Arc::new(world);
    let mut definition = ZoneDefinition::bare(1, "integration");
    definition.spawn_points = vec![[-52.0, 0.0, 24.0]];
    definition.npcs = npcs;
    Zone::new(definition, ability_book(), world.clone(), world)
}

fn npc_at(position: [f32; 3]) -> NpcSpawnDef {
    NpcSpawnDef {
        position,
        faction_id: 2,
        move_speed: 3.5,
        primary_ability: Some("claw".into()),
        stats: None,
        respawn_delay_ms: NPC_RESPAWN_DELAY_MS,
    }
}

fn tick_until(zone: &mut Zone, target_time_ms: u64, sink: &mut Vec<(MobId, ServerMessage)>) {
    while zone.now_ms() < target_time_ms {
        zone.fixed_tick();
        sink.extend(zone.drain_outbound());
    }
}

fn use_ability(seq: u64, actor: MobId, ability: &str, target: MobId) -> ClientMessage {
    ClientMessage::AbilityUse(AbilityUseMessage {
        request_id: format!("req-{seq}"),
        sequence: seq,
        client_tick: 0,
        actor_id: actor,
        ability_id: ability.into(),
        target_entity_id: Some(target),
        target_point: None,
        direction: None,
        client_time_ms: 0,
    })
}

fn acks(messages: &[(MobId, ServerMessage)]) -> Vec<&stormreach::net::AbilityAckMessage> {
    messages
        .iter()
        .filter_map(|(_, m)| match m {
            ServerMessage::AbilityAck(ack) => Some(ack),
            _ => None,
        })
        .collect()
}

#[test]
fn long_cast_with_buffered_instant() {
    let mut zone = zone_with(FlatWorld::new(200.0), vec![npc_at([-51.0, 0.0, 24.0])]);
    let npc = zone.mobs().npc_ids()[0];
    let player = zone.connect_player();
    let mut sink = Vec::new();

    // pin the npc to the player so it chases into melee instead of
    // wandering out of shield_bash range during the long cast
    {
        let mob = zone.mobs_mut().get_mut(npc).unwrap();
        mob.in_combat = true;
        mob.as_npc_mut().unwrap().aggro.add(player, 100.0);
    }

    tick_until(&mut zone, 950, &mut sink);
    sink.clear();

    zone.enqueue_message(player, use_ability(1, player, "long_cast", npc));
    zone.fixed_tick();
    sink.extend(zone.drain_outbound());

    {
        let acks = acks(&sink);
        assert_eq!(acks.len(), 1);
        let ack = acks[0];
        assert!(ack.accepted);
        assert_eq!(ack.cast_start_time_ms, 1000);
        assert_eq!(ack.cast_end_time_ms, 4000);
        assert_eq!(ack.gcd_start_time_ms, Some(1000));
        assert_eq!(ack.gcd_end_time_ms, Some(4000));
    }
    sink.clear();

    // a second on-gcd request mid-cast lands in the buffer slot, no ack yet
    tick_until(&mut zone, 1750, &mut sink);
    zone.enqueue_message(player, use_ability(2, player, "shield_bash", npc));
    zone.fixed_tick();
    sink.extend(zone.drain_outbound());
    assert!(acks(&sink).is_empty());
    assert!(zone.ability_engine().buffered_request(player).is_some());
    sink.clear();

    // cast completes and the buffered instant is admitted
    let npc_hp_before = zone.mobs().get(npc).unwrap().resources.hp;
    tick_until(&mut zone, 4100, &mut sink);

    let acks = acks(&sink);
    assert_eq!(acks.len(), 1);
    let ack = acks[0];
    assert!(ack.accepted);
    assert_eq!(ack.sequence, 2);
    assert_eq!(ack.cast_start_time_ms, 4000);
    assert_eq!(ack.cast_end_time_ms, 4000);
    assert_eq!(ack.gcd_end_time_ms, Some(4000 + GCD_MS));
    assert!(zone.ability_engine().buffered_request(player).is_none());

    // both hits landed
    let npc_hp_after = zone.mobs().get(npc).unwrap().resources.hp;
    assert!(npc_hp_after < npc_hp_before);

    let finishes: Vec<String> = zone
        .event_log()
        .since(0)
        .unwrap()
        .iter()
        .filter_map(|e| match &e.event {
            GameEvent::AbilityCastFinish { ability_id, .. } => Some(ability_id.clone()),
            _ => None,
        })
        .collect();
    assert!(finishes.contains(&"long_cast".to_string()));
    assert!(finishes.contains(&"shield_bash".to_string()));
}

#[test]
fn out_of_range_rejects_cleanly() {
    let mut zone = zone_with(FlatWorld::new(200.0), vec![npc_at([100.0, 0.0, 0.0])]);
    let npc = zone.mobs().npc_ids()[0];
    let player = zone.connect_player();
    let mut sink = Vec::new();

    let combat_events_before = zone.event_log().latest();
    zone.enqueue_message(player, use_ability(1, player, "shield_bash", npc));
    zone.fixed_tick();
    sink.extend(zone.drain_outbound());

    let acks = acks(&sink);
    assert_eq!(acks.len(), 1);
    assert!(!acks[0].accepted);
    assert_eq!(acks[0].reject_reason(), Some(RejectReason::OutOfRange));

    let new_combat_entries = zone
        .event_log()
        .since(combat_events_before)
        .unwrap()
        .iter()
        .filter(|e| {
            matches!(
                e.event,
                GameEvent::AbilityCastStart { .. }
                    | GameEvent::AbilityCastFinish { .. }
                    | GameEvent::AbilityEffectApplied { .. }
            )
        })
        .count();
    assert_eq!(new_combat_entries, 0);
}

#[test]
fn snap_lock_protocol_round_trip() {
    let mut zone = zone_with(FlatWorld::new(200.0), Vec::new());
    let player = zone.connect_player();
    let mut sink = Vec::new();

    // inputs whose predicted positions diverge far beyond the snap distance
    for seq in 1..=10u64 {
        zone.enqueue_message(
            player,
            ClientMessage::Move(MoveMessage {
                direction_x: 1.0,
                direction_z: 0.0,
                jump_pressed: false,
                is_sprinting: false,
                seq,
                tick: seq,
                predicted_x: 500.0,
                predicted_y: 0.0,
                predicted_z: 500.0,
            }),
        );
    }
    zone.fixed_tick();
    sink.extend(zone.drain_outbound());

    let snap = sink
        .iter()
        .find_map(|(id, m)| match m {
            ServerMessage::Snap { x, y, z, seq } if *id == player => Some((*x, *y, *z, *seq)),
            _ => None,
        })
        .expect("snap message");
    assert_eq!(snap.3, 1);

    {
        let pending = &zone.mobs().get(player).unwrap().as_player().unwrap().pending;
        assert!(pending.snap_locked);
        assert!(pending.queue_is_empty());
    }

    // inputs sent while locked are discarded
    zone.enqueue_message(
        player,
        ClientMessage::Move(MoveMessage {
            direction_x: 1.0,
            direction_z: 0.0,
            jump_pressed: false,
            is_sprinting: false,
            seq: 11,
            tick: 11,
            predicted_x: snap.0,
            predicted_y: snap.1,
            predicted_z: snap.2,
        }),
    );
    zone.fixed_tick();
    zone.drain_outbound();
    assert_eq!(
        zone.mobs()
            .get(player)
            .unwrap()
            .as_player()
            .unwrap()
            .pending
            .last_processed_seq,
        1
    );

    // the echo unlocks and movement resumes
    zone.enqueue_message(
        player,
        ClientMessage::SnapAck {
            seq: snap.3,
            x: snap.0,
            y: snap.1,
            z: snap.2,
        },
    );
    zone.fixed_tick();
    zone.drain_outbound();

    let before = zone.mobs().get(player).unwrap().position;
    let step = PLAYER_SPEED * TICK_MS as f32 / 1000.0;
    // the offset established earlier maps client ticks 1:1 to server ticks
    let next_tick = zone.server_tick() + 1;
    zone.enqueue_message(
        player,
        ClientMessage::Move(MoveMessage {
            direction_x: 1.0,
            direction_z: 0.0,
            jump_pressed: false,
            is_sprinting: false,
            seq: 12,
            tick: next_tick,
            predicted_x: before.x + step,
            predicted_y: before.y,
            predicted_z: before.z,
        }),
    );
    zone.fixed_tick();
    zone.drain_outbound();

    let mob = zone.mobs().get(player).unwrap();
    assert!(!mob.as_player().unwrap().pending.snap_locked);
    assert!(mob.position.x > before.x);
}

#[test]
fn npc_fights_back_in_melee() {
    let mut zone = zone_with(FlatWorld::new(200.0), vec![npc_at([-51.0, 0.0, 24.0])]);
    let npc = zone.mobs().npc_ids()[0];
    let player = zone.connect_player();
    let mut sink = Vec::new();

    zone.enqueue_message(player, use_ability(1, player, "shield_bash", npc));
    zone.fixed_tick();
    sink.extend(zone.drain_outbound());

    let player_hp_before = zone.mobs().get(player).unwrap().resources.hp;
    tick_until(&mut zone, 2000, &mut sink);

    // the npc entered combat, aggroed the player, and clawed back
    let npc_mob = zone.mobs().get(npc).unwrap();
    assert!(npc_mob.in_combat);
    assert!(npc_mob.as_npc().unwrap().aggro.raw_value(player) > 0.0);
    assert!(zone.mobs().get(player).unwrap().resources.hp < player_hp_before);

    let events = zone.event_log().since(0).unwrap();
    let enter_combat = events
        .iter()
        .filter(|e| matches!(e.event, GameEvent::MobEnterCombat { .. }))
        .count();
    assert_eq!(enter_combat, 2);
}

#[test]
fn npc_respawns_after_death() {
    let mut zone = zone_with(FlatWorld::new(200.0), vec![npc_at([-51.0, 0.0, 24.0])]);
    let npc = zone.mobs().npc_ids()[0];
    let player = zone.connect_player();
    let mut sink = Vec::new();

    zone.mobs_mut().get_mut(npc).unwrap().resources.hp = 1.0;
    zone.enqueue_message(player, use_ability(1, player, "shield_bash", npc));
    tick_until(&mut zone, 300, &mut sink);

    let died_at = zone.now_ms();
    assert!(!zone.mobs().get(npc).unwrap().is_alive());
    let events = zone.event_log().since(0).unwrap();
    assert!(
        events
            .iter()
            .any(|e| matches!(e.event, GameEvent::MobDeath { mob_id, .. } if mob_id == npc))
    );

    tick_until(&mut zone, died_at + NPC_RESPAWN_DELAY_MS + 200, &mut sink);
    let npc_mob = zone.mobs().get(npc).unwrap();
    assert!(npc_mob.is_alive());
    // back at the spawn point, modulo the first post-respawn wander steps
    assert!((npc_mob.position - Vec3::new(-51.0, 0.0, 24.0)).length() < 1.0);
    assert!(npc_mob.as_npc().unwrap().aggro.is_empty());
}

#[test]
fn replicated_state_carries_combat_fields() {
    let mut zone = zone_with(FlatWorld::new(200.0), vec![npc_at([-51.0, 0.0, 24.0])]);
    let npc = zone.mobs().npc_ids()[0];
    let player = zone.connect_player();
    let mut sink = Vec::new();

    zone.enqueue_message(player, use_ability(1, player, "long_cast", npc));
    zone.fixed_tick();
    sink.extend(zone.drain_outbound());

    let state = sink
        .iter()
        .rev()
        .find_map(|(id, m)| match m {
            ServerMessage::State(state) if *id == player => Some(state),
            _ => None,
        })
        .expect("replicated state");

    let me = state.mobs.iter().find(|m| m.id == player).unwrap();
    assert_eq!(me.cast_ability_id, "long_cast");
    assert!(me.cast_end_time_ms > me.cast_start_time_ms);
    assert!(me.max_hp > 0.0);
}
