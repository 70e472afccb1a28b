use std::sync::Arc;

use stormreach::ability::AbilityBook;
use stormreach::net::{ClientMessage, EventStreamBatchMessage, MoveMessage, ServerMessage};
use stormreach::physics::FlatWorld;
use stormreach::zone::{Zone, ZoneDefinition};
use stormreach::MobId;

use stormreach_client::{BatchSource, EventStreamClient};

fn flat_zone() -> Zone {
    let world = Arc::new(FlatWorld::new(200.0));
    Zone::new(
        ZoneDefinition::bare(1, "stream"),
        AbilityBook::new(),
        world.clone(),
        world,
    )
}

fn batches_for(
    player: MobId,
    outbound: Vec<(MobId, ServerMessage)>,
) -> (Vec<EventStreamBatchMessage>, Vec<EventStreamBatchMessage>) {
    let mut live = Vec::new();
    let mut resync = Vec::new();
    for (id, message) in outbound {
        if id != player {
            continue;
        }
        match message {
            ServerMessage::EventStreamBatch(batch) => live.push(batch),
            ServerMessage::EventStreamResyncResponse(batch) => resync.push(batch),
            _ => {}
        }
    }
    (live, resync)
}

fn walk_one_tick(zone: &mut Zone, player: MobId, seq: u64) {
    let position = zone.mobs().get(player).unwrap().position;
    zone.enqueue_message(
        player,
        ClientMessage::Move(MoveMessage {
            direction_x: 1.0,
            direction_z: 0.0,
            jump_pressed: false,
            is_sprinting: false,
            seq,
            tick: zone.server_tick() + 1,
            predicted_x: position.x + 0.25,
            predicted_y: position.y,
            predicted_z: position.z,
        }),
    );
    zone.fixed_tick();
}

#[test]
fn dropped_batch_recovers_through_resync() {
    let mut zone = flat_zone();
    let player = zone.connect_player();
    let mut client = EventStreamClient::new();

    // a first delivered batch establishes the baseline
    zone.fixed_tick();
    let (live, _) = batches_for(player, zone.drain_outbound());
    assert_eq!(live.len(), 1);
    assert!(client.on_batch(&live[0], BatchSource::Live).is_none());
    let baseline = client.last_event_id().unwrap();

    // the network eats a few batches while the player keeps moving
    for seq in 1..=3 {
        walk_one_tick(&mut zone, player, seq);
        let _ = zone.drain_outbound();
    }

    // the next delivered batch exposes the gap
    walk_one_tick(&mut zone, player, 4);
    let (live, _) = batches_for(player, zone.drain_outbound());
    assert_eq!(live.len(), 1);
    let request = client
        .on_batch(&live[0], BatchSource::Live)
        .expect("gap should trigger a resync request");
    assert_eq!(request.since_event_id, baseline);
    // the gapped batch was not ingested
    assert_eq!(client.last_event_id(), Some(baseline));

    // round-trip the resync through the zone
    zone.enqueue_message(
        player,
        ClientMessage::EventStreamResyncRequest {
            since_event_id: request.since_event_id,
        },
    );
    zone.fixed_tick();
    let (_, resync) = batches_for(player, zone.drain_outbound());
    assert_eq!(resync.len(), 1);
    assert!(client.on_batch(&resync[0], BatchSource::Resync).is_none());

    // no holes: pending event ids are contiguous from the first batch on
    let ids: Vec<u64> = client.drain_pending().iter().map(|e| e.event_id).collect();
    assert!(!ids.is_empty());
    for pair in ids.windows(2) {
        assert_eq!(pair[1], pair[0] + 1);
    }
    assert_eq!(client.last_event_id(), Some(zone.event_log().latest()));
}
