use crate::mob::{MobId, Mobs};

use super::SelectedTarget;

/// Snapshots the live top-aggro target's position and yaw, or clears the
/// selection when there is nothing to fight.
pub(super) fn run(npc_ids: &[MobId], mobs: &mut Mobs) {
    for &npc_id in npc_ids {
        let Some(mob) = mobs.get(npc_id) else {
            continue;
        };
        let Some(npc) = mob.as_npc() else {
            continue;
        };

        let selected = match (npc.ai.awareness.in_combat, npc.ai.awareness.top_aggro) {
            (true, Some(target_id)) => mobs
                .get(target_id)
                .filter(|t| t.is_alive())
                .map(|t| SelectedTarget {
                    id: target_id,
                    position: t.position,
                    yaw: t.facing_yaw,
                }),
            _ => None,
        };

        if let Some(npc) = mobs.get_mut(npc_id).and_then(|m| m.as_npc_mut()) {
            npc.ai.target = selected;
        }
    }
}
